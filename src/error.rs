//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("config: {0}")]
    Config(String),
    #[error("cannot open database '{path}': {cause}")]
    ConnectionFailed { path: String, cause: String },
    #[error("provisioning table '{table}' failed: {cause}")]
    ProvisionFailed { table: String, cause: String },
    #[error("query on '{table}' failed: {cause}")]
    QueryFailed { table: String, cause: String },
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("no valid fields to insert into '{table}'")]
    NoValidFields { table: String },
    #[error("invalid value for {field}: '{value}'")]
    InvalidEnum { field: String, value: String },
    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },
    #[error("lote with OBJECTID {0} not found")]
    ReferenceNotFound(i64),
    #[error("insert into '{table}' failed: {cause}")]
    WriteFailed { table: String, cause: String },
}

impl StoreError {
    pub(crate) fn query(table: &str, cause: impl ToString) -> Self {
        StoreError::QueryFailed {
            table: table.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn write(table: &str, cause: impl ToString) -> Self {
        StoreError::WriteFailed {
            table: table.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn provision(table: &str, cause: impl ToString) -> Self {
        StoreError::ProvisionFailed {
            table: table.to_string(),
            cause: cause.to_string(),
        }
    }

    /// True when the caller's input was rejected before anything was written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidFilter(_)
                | StoreError::NoValidFields { .. }
                | StoreError::InvalidEnum { .. }
                | StoreError::InvalidField { .. }
                | StoreError::ReferenceNotFound(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::ReferenceNotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Config(_) => "config_error",
            StoreError::ConnectionFailed { .. } => "connection_failed",
            StoreError::ProvisionFailed { .. } => "provision_failed",
            StoreError::QueryFailed { .. } => "query_failed",
            StoreError::InvalidFilter(_) => "invalid_filter",
            StoreError::NoValidFields { .. } => "no_valid_fields",
            StoreError::InvalidEnum { .. } => "invalid_enum",
            StoreError::InvalidField { .. } => "invalid_field",
            StoreError::ReferenceNotFound(_) => "not_found",
            StoreError::WriteFailed { .. } => "write_failed",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
