//! Builds parameterized SELECT and INSERT, and the DDL for the owned tables.

use crate::sql::filter::Filter;
use crate::sql::params::BindValue;
use crate::tables::{TableKind, CREATED_AT_COLUMN, ID_COLUMN, REFERENCE_COLUMN, USER_COLUMN};
use regex::Regex;
use std::sync::OnceLock;

/// Column default for the creation timestamp. Local time, same clock the writer stores.
pub const CREATED_AT_DEFAULT: &str = "(datetime('now', 'localtime'))";

/// Quote identifier (safe: validated or taken from the live schema).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Plain SQL identifier: letters, digits, underscore, not starting with a digit.
pub fn is_identifier(s: &str) -> bool {
    static IDENT: OnceLock<Option<Regex>> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(s))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: BindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    fn where_clause(&mut self, filter: Option<&Filter>) -> String {
        let Some(filter) = filter.filter(|f| !f.is_empty()) else {
            return String::new();
        };
        let mut parts = Vec::with_capacity(filter.conditions().len());
        for c in filter.conditions() {
            if c.op.takes_value() {
                let n = self.push_param(c.value.clone());
                parts.push(format!("{} {} ?{}", quoted(&c.column), c.op.as_sql(), n));
            } else {
                parts.push(format!("{} {}", quoted(&c.column), c.op.as_sql()));
            }
        }
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// SELECT * with optional filter, ORDER BY (when the table has a key), LIMIT/OFFSET.
/// Filter columns must already be resolved against the schema.
pub fn select(
    table: &str,
    filter: Option<&Filter>,
    order_by: Option<&str>,
    limit: Option<u32>,
    offset: Option<u32>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = q.where_clause(filter);
    let order_clause = order_by
        .map(|c| format!(" ORDER BY {}", quoted(c)))
        .unwrap_or_default();
    let limit_clause = match (limit, offset) {
        (Some(n), Some(o)) => format!(" LIMIT {} OFFSET {}", n, o),
        (Some(n), None) => format!(" LIMIT {}", n),
        // SQLite only accepts OFFSET after a LIMIT; -1 means no limit.
        (None, Some(o)) => format!(" LIMIT -1 OFFSET {}", o),
        (None, None) => String::new(),
    };
    q.sql = format!(
        "SELECT * FROM {}{}{}{}",
        quoted(table),
        where_clause,
        order_clause,
        limit_clause
    );
    q
}

/// SELECT COUNT(*) with the same filter semantics as [`select`].
pub fn count(table: &str, filter: Option<&Filter>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_clause = q.where_clause(filter);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(table), where_clause);
    q
}

/// INSERT with one positional placeholder per column, in the given order.
pub fn insert(table: &str, values: &[(String, BindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (name, value) in values {
        let n = q.push_param(value.clone());
        cols.push(quoted(name));
        placeholders.push(format!("?{}", n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(table),
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// CREATE TABLE for an owned table: key, reference, business columns, user, creation time.
pub fn create_table(kind: TableKind) -> String {
    let mut col_defs = vec![
        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quoted(ID_COLUMN)),
        format!("{} INTEGER NOT NULL", quoted(REFERENCE_COLUMN)),
    ];
    for c in kind.columns() {
        col_defs.push(format!("{} {}", quoted(c.name), c.sql_type));
    }
    col_defs.push(format!("{} TEXT(100)", quoted(USER_COLUMN)));
    col_defs.push(format!(
        "{} DATETIME NOT NULL DEFAULT {}",
        quoted(CREATED_AT_COLUMN),
        CREATED_AT_DEFAULT
    ));
    format!(
        "CREATE TABLE {} (\n  {}\n)",
        quoted(kind.table_name()),
        col_defs.join(",\n  ")
    )
}

/// Secondary index on the reference column.
pub fn create_index(kind: TableKind) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quoted(&kind.index_name()),
        quoted(kind.table_name()),
        quoted(REFERENCE_COLUMN)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::filter::CompareOp;

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quoted("titular"), "\"titular\"");
        assert_eq!(quoted("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn validates_identifiers() {
        assert!(is_identifier("lotes_muestra"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("lotes muestra"));
        assert!(!is_identifier("t;--"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn select_binds_filter_values() {
        let f = Filter::eq("OBJECTID_REF", 42).and("ESTADO", CompareOp::IsNotNull, BindValue::Null);
        let q = select("seguimiento", Some(&f), Some("ID"), Some(10), Some(20));
        assert_eq!(
            q.sql,
            "SELECT * FROM \"seguimiento\" WHERE \"OBJECTID_REF\" = ?1 AND \"ESTADO\" IS NOT NULL ORDER BY \"ID\" LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![BindValue::I64(42)]);
    }

    #[test]
    fn select_keeps_explicit_limit_and_handles_bare_offset() {
        let q = select("lotes_muestra", None, None, Some(5000), None);
        assert_eq!(q.sql, "SELECT * FROM \"lotes_muestra\" LIMIT 5000");
        let q = select("lotes_muestra", None, None, None, Some(3));
        assert_eq!(q.sql, "SELECT * FROM \"lotes_muestra\" LIMIT -1 OFFSET 3");
        assert!(q.params.is_empty());
    }

    #[test]
    fn count_shares_where_clause() {
        let q = count("titular", Some(&Filter::eq("CEDULA", "V-1")));
        assert_eq!(q.sql, "SELECT COUNT(*) FROM \"titular\" WHERE \"CEDULA\" = ?1");
        assert_eq!(q.params, vec![BindValue::Text("V-1".into())]);
    }

    #[test]
    fn insert_uses_positional_placeholders() {
        let q = insert(
            "titular",
            &[
                ("OBJECTID_REF".into(), BindValue::I64(1)),
                ("TITULAR".into(), BindValue::Text("x'); DROP TABLE titular; --".into())),
            ],
        );
        assert_eq!(
            q.sql,
            "INSERT INTO \"titular\" (\"OBJECTID_REF\", \"TITULAR\") VALUES (?1, ?2)"
        );
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn ddl_has_key_reference_and_timestamp() {
        let ddl = create_table(TableKind::ServicioTecnico);
        assert!(ddl.starts_with("CREATE TABLE \"servicio_tecnico\""));
        assert!(ddl.contains("\"ID\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(ddl.contains("\"OBJECTID_REF\" INTEGER NOT NULL"));
        assert!(ddl.contains("\"RIESGO\" TEXT(20)"));
        assert!(ddl.contains("\"FECHA_CREACION\" DATETIME NOT NULL DEFAULT (datetime('now', 'localtime'))"));
        assert_eq!(
            create_index(TableKind::Titular),
            "CREATE INDEX IF NOT EXISTS \"idx_titular_objectid_ref\" ON \"titular\" (\"OBJECTID_REF\")"
        );
    }
}
