// ================================================================
// File: chorely-common/src/error.rs
// ================================================================

use thiserror::Error;

use crate::models::points::PointType;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate catalog key or duplicate claim. The existing record is untouched.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("Insufficient {point_type} balance: required {required}, available {available}")]
    InsufficientFunds {
        point_type: PointType,
        required: i64,
        available: i64,
    },

    /// A lucky box with no prize entries.
    #[error("Unconfigured: {0}")]
    Unconfigured(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Storage failures. Any transaction in flight is rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}

impl Error {
    /// True for failures of the underlying store, as opposed to rejected input.
    /// Callers may retry the whole operation after one of these.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Storage(_))
    }

    /// Postgres reports unique violations as SQLSTATE 23505.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(e) => e
                .as_database_error()
                .and_then(|db_err| db_err.code())
                .map(|code| code == "23505")
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<uuid::Error> for Error {
    fn from(err: uuid::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
