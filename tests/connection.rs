mod common;

use geodb_lotes::{ConnectionManager, Driver, LotesStore, Page, StoreError, StoreSettings, TableKind};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use std::collections::HashMap;
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn first_configured_driver_opens_the_file() {
    let dir = tempdir().expect("tempdir");
    let path = common::seeded_db(dir.path()).await;
    let manager = ConnectionManager::new(StoreSettings::new(&path));

    let session = manager.acquire().await.expect("acquire");
    assert_eq!(session.driver(), Driver::Wal);
    manager.release(Some(session)).await;
    manager.release(None).await;
}

#[tokio::test]
async fn later_driver_opens_the_file_when_the_first_cannot() {
    let dir = tempdir().expect("tempdir");
    let path = common::seeded_db(dir.path()).await;

    // A writer holding the reserved lock keeps WAL from being switched on, but readers still get in.
    let mut writer = SqliteConnectOptions::new()
        .filename(&path)
        .journal_mode(SqliteJournalMode::Delete)
        .connect()
        .await
        .expect("writer");
    sqlx::query("BEGIN IMMEDIATE").execute(&mut writer).await.expect("reserve");

    let mut settings = StoreSettings::new(&path).with_drivers(vec![Driver::Wal, Driver::ReadOnly]);
    settings.busy_timeout = Duration::from_millis(100);
    let manager = ConnectionManager::new(settings);

    let session = manager.acquire().await.expect("fallback acquire");
    assert_eq!(session.driver(), Driver::ReadOnly);
    session.release().await;

    sqlx::query("ROLLBACK").execute(&mut writer).await.expect("rollback");
    writer.close().await.expect("close");
}

#[tokio::test]
async fn missing_file_fails_without_probing() {
    let dir = tempdir().expect("tempdir");
    let manager = ConnectionManager::new(StoreSettings::new(dir.path().join("nope.db")));

    match manager.acquire().await {
        Err(StoreError::ConnectionFailed { cause, .. }) => assert_eq!(cause, "file does not exist"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("opened a missing file"),
    }
    assert!(!dir.path().join("nope.db").exists(), "the store must never create the file");
}

#[tokio::test]
async fn every_driver_failure_is_reported() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("IAD.db");
    std::fs::write(&path, "lote;codigo;titular\n".repeat(64)).expect("write");
    let manager = ConnectionManager::new(StoreSettings::new(&path));

    match manager.acquire().await {
        Err(StoreError::ConnectionFailed { cause, .. }) => {
            assert!(cause.contains("wal:"), "{cause}");
            assert!(cause.contains("rollback:"), "{cause}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("opened a non-database file"),
    }
}

#[tokio::test]
async fn no_drivers_is_a_connection_failure() {
    let dir = tempdir().expect("tempdir");
    let path = common::seeded_db(dir.path()).await;
    let store = LotesStore::new(StoreSettings::new(&path).with_drivers(Vec::new()));

    let err = store.tables().await.unwrap_err();
    assert!(matches!(err, StoreError::ConnectionFailed { .. }));
    assert_eq!(err.status_code().as_u16(), 500);
}

#[tokio::test]
async fn read_only_driver_serves_reads_and_refuses_writes() {
    let dir = tempdir().expect("tempdir");
    let path = common::seeded_db(dir.path()).await;
    let store = LotesStore::new(StoreSettings::new(&path).with_drivers(vec![Driver::ReadOnly]));

    let page = store.lotes(None, Page::default()).await.expect("read");
    assert_eq!(page.total_records, common::SEEDED_LOTES);

    let fields: HashMap<String, serde_json::Value> =
        serde_json::from_value(json!({"TITULAR": "Ana"})).expect("fields");
    let err = store.insert(TableKind::Titular, 7, &fields).await.unwrap_err();
    assert!(matches!(err, StoreError::ProvisionFailed { .. }), "{err}");
    assert!(!err.is_validation());
}
