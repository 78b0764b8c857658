//! Database access layer.
//!
//! Everything that touches SQLite lives here. Callers outside this module go
//! through [`QueryExecutor`](executor::QueryExecutor) or the typed
//! repositories; only [`connection`] ever opens the database file.

/// Error taxonomy shared by every store operation.
pub mod error;

/// Ownership of the physical connections: open, close and wipe.
pub mod connection;

/// Versioned schema changes and the migration history.
pub mod migrations;

/// Parameterised queries, writes and transactions with timeouts.
pub mod executor;

/// Memo storage, soft deletion and archiving into diaries.
pub mod memos;

/// One diary per calendar date, with mood.
pub mod diaries;

pub use error::{DatabaseError, Result};
