//! Per-request entry point: every operation acquires its own connection, runs, and releases
//! it on every exit path. No connection outlives the call that opened it.

use crate::config::StoreSettings;
use crate::connection::ConnectionManager;
use crate::error::StoreError;
use crate::provision::{self, ProvisionOutcome};
use crate::schema::{self, ColumnInfo};
use crate::service::{InsertOutcome, Page, PageResult, RecordReader, RecordWriter, Row};
use crate::sql::Filter;
use crate::tables::TableKind;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct LotesStore {
    manager: ConnectionManager,
}

impl LotesStore {
    pub fn new(settings: StoreSettings) -> Self {
        LotesStore {
            manager: ConnectionManager::new(settings),
        }
    }

    /// Settings from `.env` and the process environment.
    pub fn from_env() -> Result<Self, StoreError> {
        Ok(Self::new(StoreSettings::load()?))
    }

    pub fn settings(&self) -> &StoreSettings {
        self.manager.settings()
    }

    pub async fn tables(&self) -> Result<Vec<String>, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = schema::list_tables(session.conn()).await;
        session.release().await;
        result
    }

    pub async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = schema::list_columns(session.conn(), table).await;
        session.release().await;
        result
    }

    pub async fn ensure_table(&self, kind: TableKind) -> Result<ProvisionOutcome, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = provision::ensure_table(session.conn(), kind).await;
        session.release().await;
        result
    }

    pub async fn ensure_all(&self) -> Result<Vec<(TableKind, ProvisionOutcome)>, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = provision::ensure_all(session.conn()).await;
        session.release().await;
        result
    }

    pub async fn lotes(&self, filter: Option<&Filter>, page: Page) -> Result<PageResult, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = RecordReader::lotes(session.conn(), &self.settings().lotes_table, filter, page).await;
        session.release().await;
        result
    }

    pub async fn lote(&self, objectid: i64) -> Result<Option<Row>, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = RecordReader::lote(session.conn(), &self.settings().lotes_table, objectid).await;
        session.release().await;
        result
    }

    pub async fn query(&self, table: &str, filter: Option<&Filter>, limit: Option<u32>) -> Result<Vec<Row>, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = RecordReader::query(session.conn(), table, filter, limit).await;
        session.release().await;
        result
    }

    pub async fn records(&self, kind: TableKind, filter: Option<&Filter>, limit: Option<u32>) -> Result<Vec<Row>, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = RecordReader::records(session.conn(), kind, filter, limit).await;
        session.release().await;
        result
    }

    pub async fn records_for_lote(&self, kind: TableKind, objectid: i64) -> Result<Vec<Row>, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = RecordReader::records_for_lote(session.conn(), kind, objectid).await;
        session.release().await;
        result
    }

    pub async fn insert(
        &self,
        kind: TableKind,
        reference_id: i64,
        fields: &HashMap<String, Value>,
    ) -> Result<InsertOutcome, StoreError> {
        let mut session = self.manager.acquire().await?;
        let result = RecordWriter::insert(
            session.conn(),
            &self.settings().write_policy,
            kind,
            reference_id,
            fields,
        )
        .await;
        session.release().await;
        result
    }
}
