//! Domain validation of proposed record fields, per table kind.

use crate::error::StoreError;
use crate::sql::BindValue;
use crate::tables::{FieldKind, TableKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashMap;

pub struct RecordValidator;

impl RecordValidator {
    /// Check every proposed field that `kind` knows about and normalize it:
    /// enums trimmed and uppercased, dates parsed, flags coerced to booleans.
    /// Every enum column of `kind` is required: a missing one is rejected as the empty value.
    /// Fields `kind` does not define pass through unchanged; schema filtering decides their fate.
    /// The result is ordered by field name.
    pub fn validate(
        kind: TableKind,
        fields: &HashMap<String, Value>,
    ) -> Result<Vec<(String, BindValue)>, StoreError> {
        let mut keys: Vec<&String> = fields.keys().collect();
        keys.sort();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let value = &fields[key];
            let bound = match kind.column(key) {
                Some(def) => validate_field(def.name, def.kind, value)?,
                None => BindValue::from_json(value),
            };
            out.push((key.clone(), bound));
        }
        for def in kind.columns() {
            if matches!(def.kind, FieldKind::Enum(_)) && !fields.keys().any(|k| k.eq_ignore_ascii_case(def.name)) {
                return Err(StoreError::InvalidEnum {
                    field: def.name.to_string(),
                    value: String::new(),
                });
            }
        }
        Ok(out)
    }
}

fn validate_field(name: &str, kind: FieldKind, v: &Value) -> Result<BindValue, StoreError> {
    match kind {
        FieldKind::Enum(allowed) => normalize_enum(name, v, allowed),
        FieldKind::DateTime => match v {
            Value::Null => Ok(BindValue::Null),
            Value::String(s) if s.trim().is_empty() => Ok(BindValue::Null),
            Value::String(s) => parse_datetime(s).map(BindValue::DateTime).ok_or_else(|| StoreError::InvalidField {
                field: name.to_string(),
                message: format!("'{}' is not a date; use YYYY-MM-DD", s),
            }),
            other => Err(StoreError::InvalidField {
                field: name.to_string(),
                message: format!("expected a date string, got {}", other),
            }),
        },
        FieldKind::Flag => coerce_flag(v).map(BindValue::Bool).ok_or_else(|| StoreError::InvalidField {
            field: name.to_string(),
            message: format!("expected a boolean, got {}", v),
        }),
        FieldKind::Number => match v {
            Value::Null | Value::Number(_) => Ok(BindValue::from_json(v)),
            Value::String(s) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .map(BindValue::F64)
                .map_err(|_| StoreError::InvalidField {
                    field: name.to_string(),
                    message: format!("'{}' is not a number", s),
                }),
            other => Err(StoreError::InvalidField {
                field: name.to_string(),
                message: format!("expected a number, got {}", other),
            }),
        },
        FieldKind::Text => Ok(BindValue::from_json(v)),
    }
}

/// Case-insensitive membership; the stored value is the canonical uppercase member.
fn normalize_enum(name: &str, v: &Value, allowed: &[&str]) -> Result<BindValue, StoreError> {
    let raw = match v {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    };
    let normalized = raw.trim().to_uppercase();
    if allowed.contains(&normalized.as_str()) {
        Ok(BindValue::Text(normalized))
    } else {
        Err(StoreError::InvalidEnum {
            field: name.to_string(),
            value: normalized,
        })
    }
}

fn coerce_flag(v: &Value) -> Option<bool> {
    match v {
        Value::Null => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "si" | "sí" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS[.f]` and RFC 3339
/// (kept as wall-clock time in its own offset).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_local())
}
