//! Store settings from the environment (`GEODB_*`), with `.env` support.

use crate::connection::Driver;
use crate::error::StoreError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "./IAD.db";
pub const DEFAULT_LOTES_TABLE: &str = "lotes_muestra";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Clone, Debug)]
pub struct StoreSettings {
    /// Database file. Must already exist; the store never creates it.
    pub db_path: PathBuf,
    /// Open strategies probed in order on every acquisition.
    pub drivers: Vec<Driver>,
    pub busy_timeout: Duration,
    pub lotes_table: String,
    pub write_policy: WritePolicy,
}

/// Knobs the record writer consults on every insert.
#[derive(Clone, Debug)]
pub struct WritePolicy {
    /// Reject inserts whose OBJECTID_REF has no row in the lotes table.
    pub enforce_lote_reference: bool,
    pub lotes_table: String,
}

impl Default for WritePolicy {
    fn default() -> Self {
        WritePolicy {
            enforce_lote_reference: true,
            lotes_table: DEFAULT_LOTES_TABLE.into(),
        }
    }
}

impl StoreSettings {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        StoreSettings {
            db_path: db_path.into(),
            drivers: vec![Driver::Wal, Driver::Rollback],
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            lotes_table: DEFAULT_LOTES_TABLE.into(),
            write_policy: WritePolicy::default(),
        }
    }

    pub fn with_drivers(mut self, drivers: Vec<Driver>) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_lote_reference_check(mut self, enforce: bool) -> Self {
        self.write_policy.enforce_lote_reference = enforce;
        self
    }

    /// Load `.env` if present, then read the process environment.
    pub fn load() -> Result<Self, StoreError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. `load` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("GEODB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into());
        let mut settings = StoreSettings::new(db_path);

        if let Some(raw) = lookup("GEODB_DRIVERS") {
            settings.drivers = parse_drivers(&raw)?;
        }
        if let Some(raw) = lookup("GEODB_BUSY_TIMEOUT_MS") {
            let ms = raw.trim().parse::<u64>().map_err(|_| {
                StoreError::Config(format!("GEODB_BUSY_TIMEOUT_MS must be an integer, got '{}'", raw))
            })?;
            settings.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("GEODB_ENFORCE_LOTE_REFERENCE") {
            settings.write_policy.enforce_lote_reference = parse_bool("GEODB_ENFORCE_LOTE_REFERENCE", &raw)?;
        }
        if let Some(table) = lookup("GEODB_LOTES_TABLE") {
            let table = table.trim().to_string();
            if !crate::sql::is_identifier(&table) {
                return Err(StoreError::Config(format!("GEODB_LOTES_TABLE is not a valid table name: '{}'", table)));
            }
            settings.write_policy.lotes_table = table.clone();
            settings.lotes_table = table;
        }
        Ok(settings)
    }
}

fn parse_drivers(raw: &str) -> Result<Vec<Driver>, StoreError> {
    let drivers = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Driver::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if drivers.is_empty() {
        return Err(StoreError::Config("GEODB_DRIVERS lists no drivers".into()));
    }
    Ok(drivers)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, StoreError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StoreError::Config(format!("{} must be a boolean, got '{}'", key, raw))),
    }
}
