#![allow(dead_code)]

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};

/// Lote ids present in every seeded database.
pub const SEEDED_LOTES: u64 = 26;

/// A database file shaped like the geodatabase export: a lotes table with a geometry blob,
/// lotes 1..=25 plus 42.
pub async fn seeded_db(dir: &Path) -> PathBuf {
    let path = dir.join("IAD.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .expect("create db");
    sqlx::query(
        "CREATE TABLE lotes_muestra (\
         OBJECTID INTEGER PRIMARY KEY, \
         CODIGO_LOTE TEXT(50), \
         Shape BLOB, \
         FECHA_REGISTRO DATETIME)",
    )
    .execute(&mut conn)
    .await
    .expect("create lotes_muestra");
    for id in (1..=25).chain([42]) {
        sqlx::query("INSERT INTO lotes_muestra (OBJECTID, CODIGO_LOTE, Shape, FECHA_REGISTRO) VALUES (?1, ?2, ?3, ?4)")
            .bind(id as i64)
            .bind(format!("L-{id:03}"))
            .bind(b"POINT(1 2)".to_vec())
            .bind("2024-03-05T10:00:00")
            .execute(&mut conn)
            .await
            .expect("seed lote");
    }
    conn.close().await.expect("close");
    path
}

/// A valid database file with no tables at all.
pub async fn empty_db(dir: &Path) -> PathBuf {
    let path = dir.join("empty.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .expect("create db");
    sqlx::query("PRAGMA user_version = 1")
        .execute(&mut conn)
        .await
        .expect("touch db");
    conn.close().await.expect("close");
    path
}
