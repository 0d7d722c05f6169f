//! geodb-lotes: schema-aware access to the lotes geodatabase and its auxiliary record tables
//! (titular, seguimiento, servicio_tecnico, muestra_registro).

pub mod config;
pub mod connection;
pub mod error;
pub mod provision;
pub mod schema;
pub mod service;
pub mod sql;
pub mod store;
pub mod tables;

pub use config::{StoreSettings, WritePolicy};
pub use connection::{ConnectionManager, Driver, Session};
pub use error::StoreError;
pub use provision::{ensure_all, ensure_table, ProvisionOutcome};
pub use schema::{list_columns, list_tables, ColumnInfo, SchemaSnapshot};
pub use service::{InsertOutcome, Page, PageResult, RecordReader, RecordWriter, Row};
pub use sql::{CompareOp, Filter};
pub use store::LotesStore;
pub use tables::TableKind;
