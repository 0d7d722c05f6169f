//! Validated inserts into the owned tables.
//!
//! Per call: validate → reference check → snapshot (provision if absent) → filter against
//! the snapshot → defaults → one INSERT in one transaction. Nothing is retried; a call
//! rejected by validation or the reference check touches nothing, and a rolled-back call
//! leaves no row behind.

use crate::config::WritePolicy;
use crate::error::StoreError;
use crate::provision;
use crate::schema::{self, SchemaSnapshot};
use crate::service::reader::{RecordReader, Row};
use crate::service::validation::RecordValidator;
use crate::sql::{bind_all, insert, BindValue};
use crate::tables::{TableKind, CREATED_AT_COLUMN, REFERENCE_COLUMN, USER_COLUMN};
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize)]
pub struct InsertOutcome {
    pub table: &'static str,
    /// Primary key of the new row.
    pub id: i64,
    pub reference_id: i64,
    /// Columns written, in statement order.
    pub columns: Vec<String>,
    /// Proposed keys that matched no live column.
    pub dropped: Vec<String>,
}

pub struct RecordWriter;

impl RecordWriter {
    pub async fn insert(
        conn: &mut SqliteConnection,
        policy: &WritePolicy,
        kind: TableKind,
        reference_id: i64,
        fields: &HashMap<String, Value>,
    ) -> Result<InsertOutcome, StoreError> {
        let table = kind.table_name();
        let validated = RecordValidator::validate(kind, fields)?;
        let lote = Self::parent_lote(conn, policy, kind, reference_id).await?;

        let mut snap = schema::snapshot(conn, table).await?;
        if !snap.exists() {
            provision::ensure_table(conn, kind).await?;
            snap = schema::snapshot(conn, table).await?;
        }

        let (accepted, dropped) = filter_fields(&snap, validated);
        if !dropped.is_empty() {
            tracing::debug!(table = %table, dropped = ?dropped, "dropping fields with no matching column");
        }
        if accepted.is_empty() {
            return Err(StoreError::NoValidFields {
                table: table.to_string(),
            });
        }

        let now = Local::now().naive_local();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let values = with_defaults(kind, &snap, reference_id, accepted, lote.as_ref(), now);

        let q = insert(table, &values);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut tx = conn.begin().await.map_err(|e| StoreError::write(table, e))?;
        let result = bind_all(&q.sql, &q.params).execute(&mut *tx).await;
        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    tracing::warn!(table = %table, error = %rb, "rollback failed");
                }
                tracing::warn!(table = %table, reference_id, error = %e, "insert rolled back");
                return Err(StoreError::write(table, e));
            }
        };
        tx.commit().await.map_err(|e| StoreError::write(table, e))?;

        tracing::info!(table = %table, id, reference_id, "record inserted");
        Ok(InsertOutcome {
            table,
            id,
            reference_id,
            columns: values.into_iter().map(|(c, _)| c).collect(),
            dropped,
        })
    }

    /// The parent lote row, when the policy or the kind's inherited columns need it.
    async fn parent_lote(
        conn: &mut SqliteConnection,
        policy: &WritePolicy,
        kind: TableKind,
        reference_id: i64,
    ) -> Result<Option<Row>, StoreError> {
        if policy.enforce_lote_reference {
            return match RecordReader::lote(conn, &policy.lotes_table, reference_id).await? {
                Some(row) => Ok(Some(row)),
                None => Err(StoreError::ReferenceNotFound(reference_id)),
            };
        }
        if kind.inherited_from_lote().is_empty() {
            return Ok(None);
        }
        match RecordReader::lote(conn, &policy.lotes_table, reference_id).await {
            Ok(row) => Ok(row),
            Err(e) => {
                tracing::warn!(reference_id, error = %e, "lote lookup failed; inserting without inherited fields");
                Ok(None)
            }
        }
    }
}

/// Keep fields whose name matches a live column, renamed to the schema's spelling.
/// Server-owned columns and unknown keys are dropped, never rejected.
pub fn filter_fields(
    snap: &SchemaSnapshot,
    proposed: Vec<(String, BindValue)>,
) -> (Vec<(String, BindValue)>, Vec<String>) {
    let mut accepted: Vec<(String, BindValue)> = Vec::with_capacity(proposed.len());
    let mut dropped = Vec::new();
    for (key, value) in proposed {
        match snap.column(&key) {
            Some(c) if !c.primary_key && !TableKind::is_server_column(&c.name) => {
                // "cultivo" and "CULTIVO" name the same column; the first one wins.
                if accepted.iter().any(|(n, _)| n == &c.name) {
                    dropped.push(key);
                } else {
                    accepted.push((c.name.clone(), value));
                }
            }
            _ => dropped.push(key),
        }
    }
    (accepted, dropped)
}

fn with_defaults(
    kind: TableKind,
    snap: &SchemaSnapshot,
    reference_id: i64,
    accepted: Vec<(String, BindValue)>,
    lote: Option<&Row>,
    now: NaiveDateTime,
) -> Vec<(String, BindValue)> {
    let reference = snap.resolve(REFERENCE_COLUMN).unwrap_or(REFERENCE_COLUMN).to_string();
    let mut values = Vec::with_capacity(accepted.len() + 4);
    values.push((reference, BindValue::I64(reference_id)));
    values.extend(accepted);

    let missing = |values: &[(String, BindValue)], name: &str| -> Option<String> {
        let column = snap.resolve(name)?;
        if values.iter().any(|(n, v)| n == column && !v.is_null()) {
            return None;
        }
        Some(column.to_string())
    };

    for &name in kind.inherited_from_lote() {
        let Some(column) = missing(&values, name) else { continue };
        let inherited = lote
            .and_then(|row| row.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)))
            .map(|(_, v)| BindValue::from_json(v))
            .filter(|v| !v.is_null());
        if let Some(v) = inherited {
            set(&mut values, column, v);
        }
    }
    for &name in kind.defaults_to_now() {
        if let Some(column) = missing(&values, name) {
            set(&mut values, column, BindValue::DateTime(now));
        }
    }
    if let Some(column) = missing(&values, USER_COLUMN) {
        set(&mut values, column, BindValue::Text(kind.default_user().to_string()));
    }
    if let Some(column) = snap.resolve(CREATED_AT_COLUMN) {
        set(&mut values, column.to_string(), BindValue::DateTime(now));
    }
    values
}

/// Replace the value of `column` if present, append it otherwise.
fn set(values: &mut Vec<(String, BindValue)>, column: String, value: BindValue) {
    match values.iter_mut().find(|(n, _)| *n == column) {
        Some(slot) => slot.1 = value,
        None => values.push((column, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnInfo;
    use chrono::NaiveDate;
    use serde_json::json;

    fn column(name: &str, data_type: &str, primary_key: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.into(),
            data_type: data_type.into(),
            nullable: !primary_key,
            size: None,
            primary_key,
            has_default: primary_key,
        }
    }

    fn titular_snapshot() -> SchemaSnapshot {
        SchemaSnapshot {
            table: "titular".into(),
            columns: vec![
                column("ID", "INTEGER", true),
                column("OBJECTID_REF", "INTEGER", false),
                column("CODIGO_LOTE", "TEXT", false),
                column("TITULAR", "TEXT", false),
                column("FECHA_ASIGNACION", "DATETIME", false),
                column("Usuario", "TEXT", false),
                column("FECHA_CREACION", "DATETIME", false),
            ],
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    #[test]
    fn filter_drops_unknown_and_server_columns() {
        let (accepted, dropped) = filter_fields(
            &titular_snapshot(),
            vec![
                ("FECHA_CREACION".into(), BindValue::Text("1999-01-01".into())),
                ("ID".into(), BindValue::I64(99)),
                ("NO_SUCH".into(), BindValue::I64(1)),
                ("OBJECTID_REF".into(), BindValue::I64(5)),
                ("titular".into(), BindValue::Text("Ana".into())),
            ],
        );
        assert_eq!(accepted, vec![("TITULAR".to_string(), BindValue::Text("Ana".into()))]);
        assert_eq!(dropped, vec!["FECHA_CREACION", "ID", "NO_SUCH", "OBJECTID_REF"]);
    }

    #[test]
    fn defaults_fill_reference_user_and_timestamps() {
        let values = with_defaults(
            TableKind::Titular,
            &titular_snapshot(),
            7,
            vec![("TITULAR".into(), BindValue::Text("Ana".into()))],
            None,
            now(),
        );
        assert_eq!(
            values,
            vec![
                ("OBJECTID_REF".to_string(), BindValue::I64(7)),
                ("TITULAR".to_string(), BindValue::Text("Ana".into())),
                ("FECHA_ASIGNACION".to_string(), BindValue::DateTime(now())),
                ("Usuario".to_string(), BindValue::Text("api_user".into())),
                ("FECHA_CREACION".to_string(), BindValue::DateTime(now())),
            ]
        );
    }

    #[test]
    fn caller_values_win_over_defaults_and_inheritance() {
        let lote: Row = serde_json::from_value(json!({"OBJECTID": 7, "codigo_lote": "L-7"})).unwrap();
        let values = with_defaults(
            TableKind::Titular,
            &titular_snapshot(),
            7,
            vec![("Usuario".into(), BindValue::Text("maria".into()))],
            Some(&lote),
            now(),
        );
        assert!(values.contains(&("CODIGO_LOTE".to_string(), BindValue::Text("L-7".into()))));
        assert!(values.contains(&("Usuario".to_string(), BindValue::Text("maria".into()))));

        let values = with_defaults(
            TableKind::Titular,
            &titular_snapshot(),
            7,
            vec![("CODIGO_LOTE".into(), BindValue::Text("OWN".into()))],
            Some(&lote),
            now(),
        );
        assert!(values.contains(&("CODIGO_LOTE".to_string(), BindValue::Text("OWN".into()))));
    }

    #[test]
    fn defaults_skip_columns_the_schema_lacks() {
        let snap = SchemaSnapshot {
            table: "seguimiento".into(),
            columns: vec![
                column("ID", "INTEGER", true),
                column("OBJECTID_REF", "INTEGER", false),
                column("ESTADO", "TEXT", false),
            ],
        };
        let values = with_defaults(
            TableKind::Seguimiento,
            &snap,
            3,
            vec![("ESTADO".into(), BindValue::Text("ACTIVO".into()))],
            None,
            now(),
        );
        assert_eq!(values.len(), 2);
    }
}
