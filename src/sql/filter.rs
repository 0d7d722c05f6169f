//! Row filters: a conjunction of `column op literal` conditions.
//!
//! Filters are built server-side with [`Filter::eq`] / [`Filter::and`], or parsed from a
//! small text grammar:
//!
//! ```text
//! filter    := condition ( AND condition )*
//! condition := column ( "=" | "<>" | "!=" | "<" | "<=" | ">" | ">=" ) literal
//!            | column LIKE 'string'
//!            | column IS [NOT] NULL
//! literal   := integer | decimal | 'string' | TRUE | FALSE
//! ```
//!
//! Literal values are always bound as parameters; column names must exist in the live
//! schema before a filter is rendered into SQL.

use crate::error::StoreError;
use crate::schema::SchemaSnapshot;
use crate::sql::params::BindValue;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    IsNull,
    IsNotNull,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the operator takes a right-hand value.
    pub fn takes_value(&self) -> bool {
        !matches!(self, CompareOp::IsNull | CompareOp::IsNotNull)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub value: BindValue,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`, the shape every reference lookup uses.
    pub fn eq(column: &str, value: impl Into<BindValue>) -> Self {
        Self::new().and(column, CompareOp::Eq, value)
    }

    pub fn and(mut self, column: &str, op: CompareOp, value: impl Into<BindValue>) -> Self {
        let value = if op.takes_value() { value.into() } else { BindValue::Null };
        self.conditions.push(Condition {
            column: column.to_string(),
            op,
            value,
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse the text grammar. Anything outside it is `InvalidFilter`.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let tokens = tokenize(input)?;
        Parser { tokens, pos: 0 }.filter()
    }

    /// Check every column against the live schema and rewrite it to the schema's spelling.
    pub fn resolve(&self, snapshot: &SchemaSnapshot) -> Result<Filter, StoreError> {
        let mut conditions = Vec::with_capacity(self.conditions.len());
        for c in &self.conditions {
            let column = snapshot.resolve(&c.column).ok_or_else(|| {
                StoreError::InvalidFilter(format!("unknown column '{}' in table '{}'", c.column, snapshot.table))
            })?;
            conditions.push(Condition {
                column: column.to_string(),
                op: c.op,
                value: c.value.clone(),
            });
        }
        Ok(Filter { conditions })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{} {}", c.column, c.op.as_sql())?;
            if c.op.takes_value() {
                write!(f, " {}", c.value.to_json())?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Number(String),
    Str(String),
    Op(&'static str),
}

fn tokenize(input: &str) -> Result<Vec<Token>, StoreError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Word(word));
        } else if c.is_ascii_digit() || c == '-' {
            let mut num = String::new();
            num.push(c);
            chars.next();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    num.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Number(num));
        } else if c == '\'' {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        s.push('\'');
                    }
                    Some('\'') => break,
                    Some(c) => s.push(c),
                    None => return Err(StoreError::InvalidFilter("unterminated string literal".into())),
                }
            }
            tokens.push(Token::Str(s));
        } else {
            chars.next();
            let op = match (c, chars.peek().copied()) {
                ('<', Some('=')) => {
                    chars.next();
                    "<="
                }
                ('<', Some('>')) => {
                    chars.next();
                    "<>"
                }
                ('>', Some('=')) => {
                    chars.next();
                    ">="
                }
                ('!', Some('=')) => {
                    chars.next();
                    "<>"
                }
                ('<', _) => "<",
                ('>', _) => ">",
                ('=', _) => "=",
                _ => return Err(StoreError::InvalidFilter(format!("unexpected character '{}'", c))),
            };
            tokens.push(Token::Op(op));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), StoreError> {
        match self.next() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(StoreError::InvalidFilter(format!("expected {}, found {:?}", keyword, other))),
        }
    }

    fn filter(&mut self) -> Result<Filter, StoreError> {
        let mut filter = Filter::new();
        loop {
            filter.conditions.push(self.condition()?);
            match self.next() {
                None => break,
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("AND") => continue,
                Some(other) => {
                    return Err(StoreError::InvalidFilter(format!("expected AND, found {:?}", other)))
                }
            }
        }
        Ok(filter)
    }

    fn condition(&mut self) -> Result<Condition, StoreError> {
        let column = match self.next() {
            Some(Token::Word(w)) if !is_keyword(&w) => w,
            other => return Err(StoreError::InvalidFilter(format!("expected column name, found {:?}", other))),
        };
        match self.next() {
            Some(Token::Op(op)) => {
                let op = match op {
                    "=" => CompareOp::Eq,
                    "<>" => CompareOp::Ne,
                    "<" => CompareOp::Lt,
                    "<=" => CompareOp::Le,
                    ">" => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                let value = self.literal()?;
                Ok(Condition { column, op, value })
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("LIKE") => match self.next() {
                Some(Token::Str(s)) => Ok(Condition {
                    column,
                    op: CompareOp::Like,
                    value: BindValue::Text(s),
                }),
                other => Err(StoreError::InvalidFilter(format!("LIKE needs a string, found {:?}", other))),
            },
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("IS") => {
                let op = match self.next() {
                    Some(Token::Word(w)) if w.eq_ignore_ascii_case("NULL") => CompareOp::IsNull,
                    Some(Token::Word(w)) if w.eq_ignore_ascii_case("NOT") => {
                        self.expect_keyword("NULL")?;
                        CompareOp::IsNotNull
                    }
                    other => return Err(StoreError::InvalidFilter(format!("expected NULL or NOT NULL, found {:?}", other))),
                };
                Ok(Condition {
                    column,
                    op,
                    value: BindValue::Null,
                })
            }
            other => Err(StoreError::InvalidFilter(format!("expected operator after '{}', found {:?}", column, other))),
        }
    }

    fn literal(&mut self) -> Result<BindValue, StoreError> {
        match self.next() {
            Some(Token::Number(n)) => {
                if let Ok(i) = n.parse::<i64>() {
                    Ok(BindValue::I64(i))
                } else {
                    n.parse::<f64>()
                        .map(BindValue::F64)
                        .map_err(|_| StoreError::InvalidFilter(format!("invalid number '{}'", n)))
                }
            }
            Some(Token::Str(s)) => Ok(BindValue::Text(s)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("TRUE") => Ok(BindValue::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("FALSE") => Ok(BindValue::Bool(false)),
            other => Err(StoreError::InvalidFilter(format!("expected a literal, found {:?}", other))),
        }
    }
}

fn is_keyword(w: &str) -> bool {
    ["AND", "OR", "NOT", "IS", "NULL", "LIKE", "TRUE", "FALSE", "SELECT", "UNION"]
        .iter()
        .any(|k| w.eq_ignore_ascii_case(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reference_filter() {
        let f = Filter::parse("OBJECTID_REF = 42").unwrap();
        assert_eq!(f, Filter::eq("OBJECTID_REF", 42));
    }

    #[test]
    fn parses_conjunctions_and_literals() {
        let f = Filter::parse("ESTADO = 'ACTIVO' and AREA >= -1.5 AND COSECHA = true AND GERENCIA IS NOT NULL").unwrap();
        let c = f.conditions();
        assert_eq!(c.len(), 4);
        assert_eq!(c[0].value, BindValue::Text("ACTIVO".into()));
        assert_eq!(c[1].op, CompareOp::Ge);
        assert_eq!(c[1].value, BindValue::F64(-1.5));
        assert_eq!(c[2].value, BindValue::Bool(true));
        assert_eq!(c[3].op, CompareOp::IsNotNull);
    }

    #[test]
    fn parses_like_and_escaped_quotes() {
        let f = Filter::parse("TITULAR LIKE 'O''Brien%'").unwrap();
        assert_eq!(f.conditions()[0].op, CompareOp::Like);
        assert_eq!(f.conditions()[0].value, BindValue::Text("O'Brien%".into()));
        let f = Filter::parse("CEDULA != 'V-1'").unwrap();
        assert_eq!(f.conditions()[0].op, CompareOp::Ne);
    }

    #[test]
    fn rejects_injection_attempts() {
        for bad in [
            "1=1",
            "OBJECTID_REF = 1; DROP TABLE titular",
            "OBJECTID_REF = 1 OR 1 = 1",
            "OBJECTID_REF = (SELECT 1)",
            "OBJECTID_REF = 'x",
            "OBJECTID_REF",
            "OBJECTID_REF = ",
            "OBJECTID_REF = NULL",
            "",
            "TITULAR LIKE 5",
            "NULL IS NULL",
        ] {
            assert!(
                matches!(Filter::parse(bad), Err(StoreError::InvalidFilter(_))),
                "accepted: {bad}"
            );
        }
    }

    #[test]
    fn displays_readably() {
        let f = Filter::eq("OBJECTID_REF", 7).and("ESTADO", CompareOp::IsNull, BindValue::Null);
        assert_eq!(f.to_string(), "OBJECTID_REF = 7 AND ESTADO IS NULL");
    }
}
