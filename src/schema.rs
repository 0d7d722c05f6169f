//! Live schema introspection: tables, columns, and per-write snapshots.

use crate::error::StoreError;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

/// Name prefixes of tables the engine or tooling owns.
const SYSTEM_TABLE_PREFIXES: &[&str] = &["sqlite_", "_sqlx_"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type without the size suffix, uppercased (e.g. "TEXT", "DATETIME").
    pub data_type: String,
    pub nullable: bool,
    /// Declared size, e.g. 50 for `TEXT(50)`.
    pub size: Option<u32>,
    pub primary_key: bool,
    pub has_default: bool,
}

impl ColumnInfo {
    pub fn is_boolean(&self) -> bool {
        self.data_type.contains("BOOL")
    }

    pub fn is_datetime(&self) -> bool {
        self.data_type.contains("DATE") || self.data_type.contains("TIME")
    }
}

/// Columns of one table at one point in time. Empty when the table does not exist.
#[derive(Clone, Debug, Serialize)]
pub struct SchemaSnapshot {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl SchemaSnapshot {
    pub fn exists(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Case-insensitive lookup; column names are case-insensitive in the store.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The schema's spelling of `name`, if the column exists.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.column(name).map(|c| c.name.as_str())
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.columns.iter().find(|c| c.primary_key).map(|c| c.name.as_str())
    }
}

/// Table names ordered by name, without system tables.
pub async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>, StoreError> {
    let sql = "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name";
    tracing::debug!(sql = %sql, "query");
    let names: Vec<String> = sqlx::query_scalar(sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| StoreError::query("sqlite_master", e))?;
    Ok(names
        .into_iter()
        .filter(|n| !is_system_table(n))
        .collect())
}

pub fn is_system_table(name: &str) -> bool {
    let lower = name.to_lowercase();
    SYSTEM_TABLE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Columns in declaration order. An absent table yields an empty list.
pub async fn list_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
    let sql = r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#;
    tracing::debug!(sql = %sql, table = %table, "query");
    let rows = sqlx::query(sql)
        .bind(table)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| StoreError::query(table, e))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("name").map_err(|e| StoreError::query(table, e))?;
        let declared: String = row.try_get("type").map_err(|e| StoreError::query(table, e))?;
        let not_null: i64 = row.try_get("notnull").map_err(|e| StoreError::query(table, e))?;
        let default: Option<String> = row.try_get("dflt_value").map_err(|e| StoreError::query(table, e))?;
        let pk: i64 = row.try_get("pk").map_err(|e| StoreError::query(table, e))?;
        let (data_type, size) = split_declared_type(&declared);
        columns.push(ColumnInfo {
            name,
            data_type,
            nullable: not_null == 0 && pk == 0,
            size,
            primary_key: pk > 0,
            has_default: default.is_some() || pk > 0,
        });
    }
    Ok(columns)
}

pub async fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool, StoreError> {
    Ok(!list_columns(conn, table).await?.is_empty())
}

pub async fn snapshot(conn: &mut SqliteConnection, table: &str) -> Result<SchemaSnapshot, StoreError> {
    let columns = list_columns(conn, table).await?;
    Ok(SchemaSnapshot {
        table: table.to_string(),
        columns,
    })
}

/// "VARCHAR(255)" -> ("VARCHAR", Some(255)); "DECIMAL(10,2)" -> ("DECIMAL", Some(10)).
fn split_declared_type(declared: &str) -> (String, Option<u32>) {
    let declared = declared.trim();
    match declared.find('(') {
        Some(open) => {
            let base = declared[..open].trim().to_uppercase();
            let size = declared[open + 1..]
                .trim_end_matches(')')
                .split(',')
                .next()
                .and_then(|s| s.trim().parse::<u32>().ok());
            (base, size)
        }
        None => (declared.to_uppercase(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_declared_types() {
        assert_eq!(split_declared_type("TEXT(50)"), ("TEXT".into(), Some(50)));
        assert_eq!(split_declared_type("decimal(10, 2)"), ("DECIMAL".into(), Some(10)));
        assert_eq!(split_declared_type("DATETIME"), ("DATETIME".into(), None));
        assert_eq!(split_declared_type(""), ("".into(), None));
    }

    #[test]
    fn recognises_system_tables() {
        assert!(is_system_table("sqlite_sequence"));
        assert!(is_system_table("_sqlx_migrations"));
        assert!(!is_system_table("lotes_muestra"));
    }

    #[test]
    fn snapshot_lookup_is_case_insensitive() {
        let snap = SchemaSnapshot {
            table: "titular".into(),
            columns: vec![ColumnInfo {
                name: "Usuario".into(),
                data_type: "TEXT".into(),
                nullable: true,
                size: Some(100),
                primary_key: false,
                has_default: false,
            }],
        };
        assert!(snap.exists());
        assert_eq!(snap.resolve("USUARIO"), Some("Usuario"));
        assert_eq!(snap.resolve("usuario_x"), None);
        assert_eq!(snap.primary_key(), None);
    }
}
