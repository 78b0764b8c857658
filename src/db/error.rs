//! Error taxonomy for the local store.
//!
//! Engine errors never cross the connection/executor boundary raw: they are
//! wrapped into one of the [`DatabaseError`] variants, each carrying a stable
//! [`code`](DatabaseError::code) and, where one exists, the original cause.

use crate::libs::state::DatabaseState;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Boxed cause for connection failures (engine or filesystem).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the store.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The physical connection could not be opened, closed or wiped.
    #[error("Failed to access database at '{}': {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// A single statement failed.
    #[error("Query failed: {source} (sql: {sql}, params: [{}])", params.join(", "))]
    Query {
        sql: String,
        params: Vec<String>,
        #[source]
        source: rusqlite::Error,
    },

    /// A transaction body failed or could not commit/roll back.
    #[error("Transaction failed: {message}")]
    Transaction {
        message: String,
        #[source]
        source: Option<Box<DatabaseError>>,
    },

    /// A specific migration failed; the schema stays at the previous version.
    #[error("Migration v{version} failed: {reason}")]
    Migration {
        version: u32,
        reason: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// A statement exceeded its allotted time.
    #[error("Query timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The store is not in the `Ready` state.
    #[error("Database is not ready (state: {state})")]
    NotReady { state: DatabaseState },

    /// In-flight work did not drain in time.
    #[error("Database is busy: {what}")]
    Busy { what: String },

    /// Input rejected before reaching the engine.
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
}

impl DatabaseError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            DatabaseError::Connection { .. } => "CONNECTION_ERROR",
            DatabaseError::Query { .. } => "QUERY_ERROR",
            DatabaseError::Transaction { .. } => "TRANSACTION_ERROR",
            DatabaseError::Migration { .. } => "MIGRATION_ERROR",
            DatabaseError::Timeout { .. } => "TIMEOUT_ERROR",
            DatabaseError::NotReady { .. } => "NOT_READY",
            DatabaseError::Busy { .. } => "BUSY",
            DatabaseError::Validation { .. } => "VALIDATION_ERROR",
        }
    }

    /// Whether a caller may simply retry the operation later.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DatabaseError::Query { .. } | DatabaseError::Timeout { .. } | DatabaseError::Busy { .. } | DatabaseError::Transaction { .. }
        )
    }

    pub(crate) fn connection(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        DatabaseError::Connection {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn query(sql: &str, params: &[rusqlite::types::Value], source: rusqlite::Error) -> Self {
        DatabaseError::Query {
            sql: sql.to_string(),
            params: params.iter().map(|value| format!("{:?}", value)).collect(),
            source,
        }
    }

    pub(crate) fn transaction(message: impl Into<String>, source: Option<DatabaseError>) -> Self {
        DatabaseError::Transaction {
            message: message.into(),
            source: source.map(Box::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let timeout = DatabaseError::Timeout {
            timeout: Duration::from_millis(50),
        };
        assert_eq!(timeout.code(), "TIMEOUT_ERROR");
        assert!(timeout.is_recoverable());

        let migration = DatabaseError::Migration {
            version: 2,
            reason: "boom".into(),
            source: None,
        };
        assert_eq!(migration.code(), "MIGRATION_ERROR");
        assert!(!migration.is_recoverable());
        assert_eq!(migration.to_string(), "Migration v2 failed: boom");
    }

    #[test]
    fn query_error_keeps_sql_and_params() {
        let err = DatabaseError::query(
            "SELECT * FROM nowhere WHERE id = ?1",
            &[rusqlite::types::Value::Text("m1".into())],
            rusqlite::Error::InvalidQuery,
        );
        match &err {
            DatabaseError::Query { sql, params, .. } => {
                assert!(sql.contains("nowhere"));
                assert_eq!(params.len(), 1);
                assert!(params[0].contains("m1"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.code(), "QUERY_ERROR");
    }
}
