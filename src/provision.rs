//! Create the owned tables and their reference indexes when the live schema lacks them.
//! Each table is created in its own transaction: table and index commit together or not at all.

use crate::error::StoreError;
use crate::schema;
use crate::sql::{create_index, create_table};
use crate::tables::TableKind;
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    Created,
    AlreadyPresent,
}

/// Create `kind`'s table and index if the table is absent. A present table is left untouched.
pub async fn ensure_table(conn: &mut SqliteConnection, kind: TableKind) -> Result<ProvisionOutcome, StoreError> {
    let table = kind.table_name();
    if schema::table_exists(conn, table)
        .await
        .map_err(|e| StoreError::provision(table, e))?
    {
        return Ok(ProvisionOutcome::AlreadyPresent);
    }

    match create(conn, kind).await {
        Ok(()) => {
            tracing::info!(table = %table, "table provisioned");
            Ok(ProvisionOutcome::Created)
        }
        Err(e) => {
            // Another connection may have created it between the check and our CREATE.
            if schema::table_exists(conn, table).await.unwrap_or(false) {
                tracing::debug!(table = %table, error = %e, "table appeared concurrently");
                return Ok(ProvisionOutcome::AlreadyPresent);
            }
            tracing::warn!(table = %table, error = %e, "provisioning failed");
            Err(StoreError::provision(table, e))
        }
    }
}

/// Provision every owned table, in declaration order.
pub async fn ensure_all(conn: &mut SqliteConnection) -> Result<Vec<(TableKind, ProvisionOutcome)>, StoreError> {
    let mut out = Vec::with_capacity(TableKind::ALL.len());
    for kind in TableKind::ALL {
        out.push((kind, ensure_table(conn, kind).await?));
    }
    Ok(out)
}

async fn create(conn: &mut SqliteConnection, kind: TableKind) -> Result<(), sqlx::Error> {
    let statements = [create_table(kind), create_index(kind)];
    let mut tx = conn.begin().await?;
    for sql in &statements {
        tracing::debug!(sql = %sql, "query (tx)");
        let result = sqlx::query(sql).execute(&mut *tx).await;
        if let Err(e) = result {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            return Err(e);
        }
    }
    tx.commit().await
}
