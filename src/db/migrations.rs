//! Database schema migration management and versioning system.
//!
//! Brings the schema from whatever version was last applied up to the latest
//! known version, exactly once per version and atomically per migration.
//!
//! ## Features
//!
//! - **Version Cursor**: A single-row `schema_version` table is the authoritative cursor
//! - **History**: Every applied migration is recorded in `schema_migrations`
//! - **Per-Migration Transactions**: A failing migration rolls back alone; earlier ones stay committed
//! - **Idempotence**: With nothing pending, a run performs no writes at all
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memodiary::db::migrations::MigrationRunner;
//! use memodiary::libs::logger::Logger;
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open("memodiary.db")?;
//! let runner = MigrationRunner::new(Logger::disabled());
//! let report = runner.run(&mut conn)?;
//! println!("now at v{}", report.current_version);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Shipped migrations are never edited; schema changes are appended as new versions.

use crate::db::error::{DatabaseError, Result};
use crate::libs::logger::Logger;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

const SCHEMA_VERSION_TABLE: &str = "CREATE TABLE schema_version (
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL
)";
const SCHEMA_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL
)";
const TABLE_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)";
const SELECT_VERSION: &str = "SELECT version FROM schema_version LIMIT 1";
const INSERT_VERSION_ZERO: &str = "INSERT INTO schema_version (version, applied_at) VALUES (0, ?1)";
const UPDATE_VERSION: &str = "UPDATE schema_version SET version = ?1, applied_at = ?2";
const INSERT_HISTORY: &str = "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)";
const SELECT_HISTORY: &str = "SELECT version, name, applied_at FROM schema_migrations ORDER BY version";

/// A single versioned schema change.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Strictly increasing version, starting at 1
    pub version: u32,
    /// Human-readable name describing the change
    pub name: &'static str,
    /// Statements executed in order inside one transaction
    pub statements: Vec<&'static str>,
}

impl Migration {
    pub fn new(version: u32, name: &'static str, statements: Vec<&'static str>) -> Self {
        Self { version, name, statements }
    }
}

/// A migration that has been applied to the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub version: u32,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Outcome of a [`MigrationRunner::run`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationReport {
    /// Versions applied by this run, in order
    pub applied: Vec<u32>,
    /// Schema version after the run
    pub current_version: u32,
}

/// Schema version against the runner's latest known version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub current_version: u32,
    pub latest_version: u32,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.current_version >= self.latest_version
    }
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// The schema history of the store, oldest first.
pub fn builtin_migrations() -> Vec<Migration> {
    vec![
        // Version 1: memos and diaries
        Migration::new(
            1,
            "create_memos_and_diaries",
            vec![
                "CREATE TABLE IF NOT EXISTS memos (
                    id TEXT PRIMARY KEY,
                    content TEXT NOT NULL DEFAULT '',
                    tags_json TEXT NOT NULL DEFAULT '[]',
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    diary_date TEXT NULL,
                    is_deleted INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                "CREATE TABLE IF NOT EXISTS diaries (
                    date TEXT PRIMARY KEY,
                    summary TEXT NOT NULL DEFAULT '',
                    mood_key TEXT NULL,
                    mood_score INTEGER NULL CHECK (mood_score IS NULL OR mood_score BETWEEN 1 AND 10),
                    cover_image_id TEXT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
            ],
        ),
        // Version 2: indices for date-range statistics and diary lookups
        Migration::new(
            2,
            "add_stats_indices",
            vec![
                "CREATE INDEX IF NOT EXISTS idx_memos_created_at ON memos(created_at)",
                "CREATE INDEX IF NOT EXISTS idx_memos_diary_date ON memos(diary_date)",
                "CREATE INDEX IF NOT EXISTS idx_memos_is_deleted ON memos(is_deleted)",
                "CREATE INDEX IF NOT EXISTS idx_diaries_mood_key ON diaries(mood_key)",
            ],
        ),
    ]
}

/// Applies ordered schema migrations.
pub struct MigrationRunner {
    migrations: Vec<Migration>,
    logger: Logger,
}

impl MigrationRunner {
    /// Runner over the built-in schema history.
    pub fn new(logger: Logger) -> Self {
        Self {
            migrations: builtin_migrations(),
            logger,
        }
    }

    /// Runner over a custom sequence.
    ///
    /// Versions must be exactly `1, 2, 3, ...`; anything else is rejected
    /// with a migration error naming the first offending version.
    pub fn with_migrations(migrations: Vec<Migration>, logger: Logger) -> Result<Self> {
        for (index, migration) in migrations.iter().enumerate() {
            let expected = index as u32 + 1;
            if migration.version != expected {
                return Err(DatabaseError::Migration {
                    version: migration.version,
                    reason: Message::MigrationOutOfSequence(expected, migration.version).to_string(),
                    source: None,
                });
            }
        }
        Ok(Self { migrations, logger })
    }

    /// Highest version this runner knows about.
    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    /// Applies every pending migration.
    ///
    /// Each migration runs in its own transaction together with the cursor
    /// update and the history row. The first failure rolls back that
    /// migration, stops the run and is returned as [`DatabaseError::Migration`].
    pub fn run(&self, conn: &mut Connection) -> Result<MigrationReport> {
        let current_version = self.ensure_metadata(conn)?;

        let pending: Vec<&Migration> = self.migrations.iter().filter(|m| m.version > current_version).collect();
        if pending.is_empty() {
            msg_debug!(self.logger, Message::DatabaseUpToDate);
            return Ok(MigrationReport {
                applied: Vec::new(),
                current_version,
            });
        }

        msg_info!(self.logger, Message::MigrationsFound(pending.len()));

        let mut report = MigrationReport {
            applied: Vec::new(),
            current_version,
        };
        for migration in pending {
            msg_info!(self.logger, Message::RunningMigration(migration.version, migration.name.to_string()));

            if let Err(e) = Self::apply(conn, migration) {
                msg_error!(self.logger, Message::MigrationFailed(migration.version, e.to_string()));
                return Err(DatabaseError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                    source: Some(e),
                });
            }

            msg_info!(self.logger, Message::MigrationCompleted(migration.version));
            report.applied.push(migration.version);
            report.current_version = migration.version;
        }

        msg_info!(self.logger, Message::AllMigrationsCompleted(report.current_version));
        Ok(report)
    }

    /// Current schema version, `0` for a database that was never migrated.
    pub fn current_version(&self, conn: &Connection) -> Result<u32> {
        if !table_exists(conn, "schema_version")? {
            return Ok(0);
        }
        let version: Option<u32> = conn
            .query_row(SELECT_VERSION, [], |row| row.get(0))
            .optional()
            .map_err(|e| DatabaseError::query(SELECT_VERSION, &[], e))?;
        Ok(version.unwrap_or(0))
    }

    /// Current and latest version in one read.
    pub fn status(&self, conn: &Connection) -> Result<MigrationStatus> {
        Ok(MigrationStatus {
            current_version: self.current_version(conn)?,
            latest_version: self.latest_version(),
        })
    }

    /// Whether migrations are pending.
    pub fn needs_migration(&self, conn: &Connection) -> Result<bool> {
        Ok(self.current_version(conn)? < self.latest_version())
    }

    /// Applied migrations, oldest first.
    pub fn history(&self, conn: &Connection) -> Result<Vec<MigrationRecord>> {
        if !table_exists(conn, "schema_migrations")? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(SELECT_HISTORY).map_err(|e| DatabaseError::query(SELECT_HISTORY, &[], e))?;
        let rows = stmt
            .query_map([], |row| {
                let applied_at: i64 = row.get(2)?;
                Ok(MigrationRecord {
                    version: row.get(0)?,
                    name: row.get(1)?,
                    applied_at: Utc.timestamp_millis_opt(applied_at).single().unwrap_or_default(),
                })
            })
            .map_err(|e| DatabaseError::query(SELECT_HISTORY, &[], e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| DatabaseError::query(SELECT_HISTORY, &[], e))
    }

    /// Creates the metadata tables when absent and returns the cursor.
    ///
    /// Only writes when something is actually missing.
    fn ensure_metadata(&self, conn: &mut Connection) -> Result<u32> {
        let has_version = table_exists(conn, "schema_version")?;
        let has_history = table_exists(conn, "schema_migrations")?;
        let cursor = if has_version {
            conn.query_row(SELECT_VERSION, [], |row| row.get::<_, u32>(0))
                .optional()
                .map_err(|e| DatabaseError::query(SELECT_VERSION, &[], e))?
        } else {
            None
        };
        if let (Some(version), true) = (cursor, has_history) {
            return Ok(version);
        }

        let wrap = |e: rusqlite::Error| DatabaseError::Migration {
            version: 0,
            reason: Message::MetadataSetupFailed(e.to_string()).to_string(),
            source: Some(e),
        };
        let tx = conn.transaction().map_err(wrap)?;
        if !has_version {
            tx.execute(SCHEMA_VERSION_TABLE, []).map_err(wrap)?;
        }
        if cursor.is_none() {
            tx.execute(INSERT_VERSION_ZERO, params![Utc::now().timestamp_millis()]).map_err(wrap)?;
        }
        tx.execute(SCHEMA_MIGRATIONS_TABLE, []).map_err(wrap)?;
        tx.commit().map_err(wrap)?;
        msg_debug!(self.logger, Message::MetadataCreated);

        self.current_version(conn)
    }

    fn apply(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
        let tx = conn.transaction()?;
        for statement in &migration.statements {
            tx.execute_batch(statement)?;
        }
        let applied_at = Utc::now().timestamp_millis();
        tx.execute(UPDATE_VERSION, params![migration.version, applied_at])?;
        tx.execute(INSERT_HISTORY, params![migration.version, migration.name, applied_at])?;
        // dropping an uncommitted transaction rolls it back
        tx.commit()
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    conn.query_row(TABLE_EXISTS, params![name], |row| row.get::<_, bool>(0))
        .map_err(|e| DatabaseError::query(TABLE_EXISTS, &[rusqlite::types::Value::Text(name.to_string())], e))
}
