//! Human-readable text for [`Message`].
//!
//! All wording lives here so the store and the CLI stay consistent and a
//! message can be reworded without touching the code that emits it.

use super::types::Message;
use std::fmt;

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            // === CONNECTION MESSAGES ===
            Message::ConnectionOpened(path, readers) => format!("Database opened at {} ({} snapshot readers)", path, readers),
            Message::ConnectionOpenFailed(path, error) => format!("Failed to open database at {}: {}", path, error),
            Message::ConnectionAlreadyClosed => "Database is already closed".to_string(),
            Message::ConnectionClosed(path) => format!("Database at {} closed", path),
            Message::ConnectionCloseFailed(error) => format!("Failed to close database: {}", error),
            Message::QueriesStillRunning(wait) => format!("queries still running after {:?}", wait),
            Message::ConnectionDraining => "connection is closing for a reset".to_string(),
            Message::JournalMode(mode) => format!("Journal mode: {}", mode),
            Message::WipeWhileOpen => "cannot remove database files while the connection is open".to_string(),
            Message::FileRemoved(path) => format!("Removed {}", path),
            Message::FileRemoveFailed(path, error) => format!("Failed to remove {}: {}", path, error),

            // === MIGRATION MESSAGES ===
            Message::MigrationsFound(count) => format!("Found {} pending database migrations", count),
            Message::RunningMigration(version, name) => format!("Running migration v{}: {}", version, name),
            Message::MigrationCompleted(version) => format!("Migration v{} completed", version),
            Message::MigrationFailed(version, error) => format!("Migration v{} failed: {}", version, error),
            Message::AllMigrationsCompleted(version) => format!("All database migrations completed, schema at v{}", version),
            Message::MigrationOutOfSequence(expected, found) => format!("expected migration v{}, found v{}", expected, found),
            Message::MetadataCreated => "Migration metadata tables created".to_string(),
            Message::MetadataSetupFailed(error) => format!("could not set up migration metadata: {}", error),
            Message::DatabaseVersion(version) => format!("Current database version: {}", version),
            Message::DatabaseUpToDate => "Database schema is up to date".to_string(),
            Message::DatabaseNeedsUpdate(current, latest) => format!("Database schema needs to be updated (v{} -> v{})", current, latest),
            Message::MigrationHistory => "Migration history:".to_string(),
            Message::NoMigrationsApplied => "No migrations applied yet".to_string(),

            // === QUERY MESSAGES ===
            Message::QueryStarted(sql) => format!("Executing: {}", sql),
            Message::QueryFailed(code, error) => format!("[{}] {}", code, error),
            Message::QueryTimedOut(sql, timeout) => format!("Query exceeded {:?}, interrupting: {}", timeout, sql),
            Message::WorkerFailed(error) => format!("database worker failed: {}", error),
            Message::TransactionBeginFailed => "could not begin transaction".to_string(),
            Message::TransactionCommitFailed => "could not commit transaction".to_string(),
            Message::TransactionRolledBack(error) => format!("Transaction rolled back: {}", error),
            Message::TransactionRollbackFailed(error) => format!("Rollback failed: {}", error),

            // === LIFECYCLE MESSAGES ===
            Message::StateChanged(from, to) => format!("Database state {} -> {}", from, to),
            Message::IllegalTransition(from, to) => format!("Illegal database state transition {} -> {} ignored", from, to),
            Message::StoreInitializing(path) => format!("Initializing store at {}", path),
            Message::StoreReady(version) => format!("Store ready at schema version {}", version),
            Message::StoreAlreadyReady => "Store is already initialized".to_string(),
            Message::StoreInitFailed(error) => format!("Store initialization failed: {}", error),
            Message::StoreInitJoined(state) => format!("Joined a concurrent initialization that ended in {}", state),
            Message::StoreResetting => "Resetting store".to_string(),
            Message::StoreResetSkipped => "Store is not initialized, nothing to reset".to_string(),
            Message::StoreResetCompleted => "Store reset, database files removed".to_string(),
            Message::StoreResetFailed(error) => format!("Store reset failed: {}", error),

            // === REPOSITORY MESSAGES ===
            Message::MoodScoreOutOfRange(score) => format!("mood score {} is outside 1..=10", score),
            Message::EmptyMoodKey => "mood key must not be empty".to_string(),
            Message::MemosArchived(count, date) => format!("Archived {} memos into diary {}", count, date),
            Message::ArchiveRequiresMemos => "at least one memo is required".to_string(),
            Message::MemoTagsEncodeFailed(error) => format!("could not encode memo tags: {}", error),

            // === STATS MESSAGES ===
            Message::TagsRowSkipped(id, error) => format!("Skipping memo {} with malformed tags: {}", id, error),
            Message::EmptyDateRange(start, end) => format!("Date range {}..{} is empty", start, end),

            // === CLI MESSAGES ===
            Message::StoreInitialized(path) => format!("Store initialized at {}", path),
            Message::ConfirmReset(path) => format!("This permanently deletes {}. Continue?", path),
            Message::ResetCancelled => "Reset cancelled".to_string(),
            Message::ResetCompleted => "Local store wiped".to_string(),
            Message::HeatMapHeader(start, end) => format!("Mood heatmap {} .. {}", start, end),
            Message::TagsHeader => "Tags".to_string(),
            Message::MoodsHeader(start, end) => format!("Mood distribution {} .. {}", start, end),
            Message::NoStatsForRange => "Nothing recorded for this range".to_string(),
            Message::InvalidDate(value) => format!("Invalid date '{}', expected YYYY-MM-DD", value),
        };

        write!(f, "{}", text)
    }
}
