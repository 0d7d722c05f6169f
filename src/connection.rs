//! Connection lifecycle: probe the configured drivers against the database file,
//! hand out one connection per unit of work, close it deterministically.

use crate::config::StoreSettings;
use crate::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode};
use sqlx::{ConnectOptions, Connection};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// An open strategy for the database file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    /// Read-write with a write-ahead log.
    Wal,
    /// Read-write with a rollback journal; for filesystems without shared memory (network shares).
    Rollback,
    /// Read-only. Reads work, every write fails.
    ReadOnly,
}

impl Driver {
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Wal => "wal",
            Driver::Rollback => "rollback",
            Driver::ReadOnly => "readonly",
        }
    }

    fn options(&self, path: &Path, settings: &StoreSettings) -> SqliteConnectOptions {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .busy_timeout(settings.busy_timeout);
        match self {
            Driver::Wal => opts.journal_mode(SqliteJournalMode::Wal),
            Driver::Rollback => opts.journal_mode(SqliteJournalMode::Delete),
            Driver::ReadOnly => opts.read_only(true),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Driver {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wal" => Ok(Driver::Wal),
            "rollback" | "delete" => Ok(Driver::Rollback),
            "readonly" | "read-only" | "ro" => Ok(Driver::ReadOnly),
            other => Err(StoreError::Config(format!("unknown driver '{}'", other))),
        }
    }
}

/// One open connection and the driver that opened it.
pub struct Session {
    conn: SqliteConnection,
    driver: Driver,
}

impl Session {
    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Close the connection. Close errors are logged, not returned: the unit of work already finished.
    pub async fn release(self) {
        if let Err(e) = self.conn.close().await {
            tracing::warn!(driver = %self.driver, error = %e, "closing connection failed");
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionManager {
    settings: StoreSettings,
}

impl ConnectionManager {
    pub fn new(settings: StoreSettings) -> Self {
        ConnectionManager { settings }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Open the database file with the first driver that works.
    /// A missing file fails immediately without probing any driver.
    pub async fn acquire(&self) -> Result<Session, StoreError> {
        let path = self.settings.db_path.as_path();
        let path_str = path.display().to_string();
        if !path.is_file() {
            return Err(StoreError::ConnectionFailed {
                path: path_str,
                cause: "file does not exist".into(),
            });
        }
        if self.settings.drivers.is_empty() {
            return Err(StoreError::ConnectionFailed {
                path: path_str,
                cause: "no drivers configured".into(),
            });
        }

        let mut failures = Vec::with_capacity(self.settings.drivers.len());
        for driver in &self.settings.drivers {
            match open(*driver, path, &self.settings).await {
                Ok(conn) => {
                    tracing::debug!(path = %path_str, driver = %driver, "connection opened");
                    return Ok(Session { conn, driver: *driver });
                }
                Err(e) => {
                    tracing::warn!(path = %path_str, driver = %driver, error = %e, "driver could not open database");
                    failures.push(format!("{}: {}", driver, e));
                }
            }
        }
        Err(StoreError::ConnectionFailed {
            path: path_str,
            cause: failures.join("; "),
        })
    }

    /// Release a session if there is one. `None` (acquisition never succeeded) is a no-op.
    pub async fn release(&self, session: Option<Session>) {
        if let Some(session) = session {
            session.release().await;
        }
    }
}

async fn open(driver: Driver, path: &Path, settings: &StoreSettings) -> Result<SqliteConnection, sqlx::Error> {
    let mut conn = driver.options(path, settings).connect().await?;
    // Opening is lazy about the file format; the first read catches non-database files.
    if let Err(e) = sqlx::query("SELECT COUNT(*) FROM sqlite_master").execute(&mut conn).await {
        let _ = conn.close().await;
        return Err(e);
    }
    Ok(conn)
}
