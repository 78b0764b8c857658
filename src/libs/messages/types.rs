//! Message catalogue.
//!
//! Every line the store logs and every line the CLI prints is a variant of
//! [`Message`]; the text lives in [`display`](super::display).

use crate::libs::state::DatabaseState;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Message {
    // === CONNECTION MESSAGES ===
    ConnectionOpened(String, usize),
    ConnectionOpenFailed(String, String),
    ConnectionAlreadyClosed,
    ConnectionClosed(String),
    ConnectionCloseFailed(String),
    QueriesStillRunning(Duration),
    ConnectionDraining,
    JournalMode(String),
    WipeWhileOpen,
    FileRemoved(String),
    FileRemoveFailed(String, String),

    // === MIGRATION MESSAGES ===
    MigrationsFound(usize),
    RunningMigration(u32, String),
    MigrationCompleted(u32),
    MigrationFailed(u32, String),
    AllMigrationsCompleted(u32),
    MigrationOutOfSequence(u32, u32),
    MetadataCreated,
    MetadataSetupFailed(String),
    DatabaseVersion(u32),
    DatabaseUpToDate,
    DatabaseNeedsUpdate(u32, u32),
    MigrationHistory,
    NoMigrationsApplied,

    // === QUERY MESSAGES ===
    QueryStarted(String),
    QueryFailed(&'static str, String),
    QueryTimedOut(String, Duration),
    WorkerFailed(String),
    TransactionBeginFailed,
    TransactionCommitFailed,
    TransactionRolledBack(String),
    TransactionRollbackFailed(String),

    // === LIFECYCLE MESSAGES ===
    StateChanged(DatabaseState, DatabaseState),
    IllegalTransition(DatabaseState, DatabaseState),
    StoreInitializing(String),
    StoreReady(u32),
    StoreAlreadyReady,
    StoreInitFailed(String),
    StoreInitJoined(DatabaseState),
    StoreResetting,
    StoreResetSkipped,
    StoreResetCompleted,
    StoreResetFailed(String),

    // === REPOSITORY MESSAGES ===
    MoodScoreOutOfRange(i64),
    EmptyMoodKey,
    MemosArchived(usize, String),
    ArchiveRequiresMemos,
    MemoTagsEncodeFailed(String),

    // === STATS MESSAGES ===
    TagsRowSkipped(String, String),
    EmptyDateRange(String, String),

    // === CLI MESSAGES ===
    StoreInitialized(String),
    ConfirmReset(String),
    ResetCancelled,
    ResetCompleted,
    HeatMapHeader(String, String),
    TagsHeader,
    MoodsHeader(String, String),
    NoStatsForRange,
    InvalidDate(String),
}
