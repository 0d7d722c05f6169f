//! Filtered, paginated reads with transport-safe cell conversion.

use crate::error::StoreError;
use crate::schema::{self, ColumnInfo, SchemaSnapshot};
use crate::service::validation::parse_datetime;
use crate::sql::{bind_all, count, is_identifier, select, Filter, DATETIME_FORMAT};
use crate::tables::{TableKind, LOTE_ID_COLUMN};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// One result row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request. Out-of-range values are clamped, never rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Page {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PageResult {
    pub rows: Vec<Row>,
    pub page: u32,
    pub page_size: u32,
    pub total_records: u64,
    pub total_pages: u64,
}

pub struct RecordReader;

impl RecordReader {
    /// Rows of `table` matching `filter`, at most `limit` of them (all when `None`), in
    /// primary-key order when the table has one.
    pub async fn query(
        conn: &mut SqliteConnection,
        table: &str,
        filter: Option<&Filter>,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError> {
        let snap = existing_snapshot(conn, table).await?;
        let filter = filter.map(|f| f.resolve(&snap)).transpose()?;
        let q = select(table, filter.as_ref(), snap.primary_key(), limit, None);
        fetch_rows(conn, &snap, &q.sql, &q.params).await
    }

    /// One page of `table` plus the totals needed to render pagination.
    pub async fn page(
        conn: &mut SqliteConnection,
        table: &str,
        filter: Option<&Filter>,
        page: Page,
    ) -> Result<PageResult, StoreError> {
        let snap = existing_snapshot(conn, table).await?;
        let filter = filter.map(|f| f.resolve(&snap)).transpose()?;

        let cq = count(table, filter.as_ref());
        tracing::debug!(sql = %cq.sql, params = ?cq.params, "query");
        let total: i64 = bind_all(&cq.sql, &cq.params)
            .fetch_one(&mut *conn)
            .await
            .and_then(|r| r.try_get::<i64, _>(0))
            .map_err(|e| StoreError::query(table, e))?;
        let total_records = total.max(0) as u64;
        let size = u64::from(page.page_size);

        let q = select(
            table,
            filter.as_ref(),
            snap.primary_key(),
            Some(page.page_size),
            Some(page.offset()),
        );
        let rows = fetch_rows(conn, &snap, &q.sql, &q.params).await?;
        Ok(PageResult {
            rows,
            page: page.page,
            page_size: page.page_size,
            total_records,
            total_pages: total_records.div_ceil(size),
        })
    }

    /// Rows of an owned table. A table that was never provisioned has no rows.
    pub async fn records(
        conn: &mut SqliteConnection,
        kind: TableKind,
        filter: Option<&Filter>,
        limit: Option<u32>,
    ) -> Result<Vec<Row>, StoreError> {
        if !schema::table_exists(conn, kind.table_name()).await? {
            return Ok(Vec::new());
        }
        Self::query(conn, kind.table_name(), filter, limit).await
    }

    /// Records of `kind` attached to one lote.
    pub async fn records_for_lote(
        conn: &mut SqliteConnection,
        kind: TableKind,
        objectid: i64,
    ) -> Result<Vec<Row>, StoreError> {
        let filter = Filter::eq(crate::tables::REFERENCE_COLUMN, objectid);
        Self::records(conn, kind, Some(&filter), None).await
    }

    /// One page of lotes from `lotes_table`.
    pub async fn lotes(
        conn: &mut SqliteConnection,
        lotes_table: &str,
        filter: Option<&Filter>,
        page: Page,
    ) -> Result<PageResult, StoreError> {
        Self::page(conn, lotes_table, filter, page).await
    }

    /// The lote with `OBJECTID = objectid`. `None` when it, or the lotes table, is missing.
    pub async fn lote(
        conn: &mut SqliteConnection,
        lotes_table: &str,
        objectid: i64,
    ) -> Result<Option<Row>, StoreError> {
        let snap = schema::snapshot(conn, lotes_table).await?;
        if !snap.exists() {
            return Ok(None);
        }
        if snap.column(LOTE_ID_COLUMN).is_none() {
            return Err(StoreError::query(
                lotes_table,
                format!("table has no {} column", LOTE_ID_COLUMN),
            ));
        }
        let filter = Filter::eq(LOTE_ID_COLUMN, objectid).resolve(&snap)?;
        let q = select(lotes_table, Some(&filter), None, Some(1), None);
        let mut rows = fetch_rows(conn, &snap, &q.sql, &q.params).await?;
        Ok(rows.pop())
    }
}

async fn existing_snapshot(conn: &mut SqliteConnection, table: &str) -> Result<SchemaSnapshot, StoreError> {
    if !is_identifier(table) {
        return Err(StoreError::query(table, "invalid table name"));
    }
    let snap = schema::snapshot(conn, table).await?;
    if !snap.exists() {
        return Err(StoreError::query(table, "no such table"));
    }
    Ok(snap)
}

async fn fetch_rows(
    conn: &mut SqliteConnection,
    snap: &SchemaSnapshot,
    sql: &str,
    params: &[crate::sql::BindValue],
) -> Result<Vec<Row>, StoreError> {
    tracing::debug!(sql = %sql, params = ?params, "query");
    let rows = bind_all(sql, params)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| StoreError::query(&snap.table, e))?;
    Ok(rows.iter().map(|r| row_to_json(r, snap)).collect())
}

fn row_to_json(row: &SqliteRow, snap: &SchemaSnapshot) -> Row {
    let mut map = Row::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, idx, snap.column(name)));
    }
    map
}

/// NULL -> null, INTEGER -> number (boolean for BOOLEAN columns), REAL -> number,
/// TEXT -> string (date/time columns normalized to `YYYY-MM-DD HH:MM:SS`),
/// BLOB -> UTF-8 string with replacement characters.
fn cell_to_value(row: &SqliteRow, idx: usize, info: Option<&ColumnInfo>) -> Value {
    let storage = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };
    let is_bool = info.is_some_and(ColumnInfo::is_boolean);
    let is_datetime = info.is_some_and(ColumnInfo::is_datetime);

    match storage.as_str() {
        "INTEGER" if is_bool => {
            if let Ok(n) = row.try_get::<i64, _>(idx) {
                return Value::Bool(n != 0);
            }
        }
        "INTEGER" => {
            if let Ok(n) = row.try_get::<i64, _>(idx) {
                return Value::Number(n.into());
            }
        }
        "REAL" => {
            if let Ok(n) = row.try_get::<f64, _>(idx) {
                return serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
            }
        }
        "TEXT" => {
            if let Ok(s) = row.try_get::<String, _>(idx) {
                if is_datetime {
                    if let Some(d) = parse_datetime(&s) {
                        return Value::String(d.format(DATETIME_FORMAT).to_string());
                    }
                }
                return Value::String(s);
            }
        }
        "BLOB" => {
            if let Ok(bytes) = row.try_get::<Vec<u8>, _>(idx) {
                return Value::String(String::from_utf8_lossy(&bytes).into_owned());
            }
        }
        _ => {}
    }
    if let Ok(s) = row.try_get_unchecked::<String, _>(idx) {
        return Value::String(s);
    }
    Value::Null
}
