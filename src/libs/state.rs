//! Lifecycle state machine for the local store.
//!
//! [`StateStore`] ties the [`ConnectionManager`] and the [`MigrationRunner`]
//! together behind two operations, [`initialize`](StateStore::initialize) and
//! [`reset`](StateStore::reset), and publishes every state change.
//!
//! ## Transitions
//!
//! ```text
//!                 initialize()             open + migrate ok
//! Uninitialized ───────────────▶ Initializing ───────────────▶ Ready
//!       ▲                          │      ▲                     │
//!       │ close + wipe ok          │ fail │ retry               │ reset()
//!       │                          ▼      │                     ▼
//!       └────────────────────── Resetting ◀──── reset() ──── Error
//!                                  │                            ▲
//!                                  └──── close/wipe fail ───────┘
//! ```
//!
//! Any other transition is a programming error: it panics in debug builds and
//! is logged and ignored in release builds.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memodiary::libs::config::StoreConfig;
//! use memodiary::libs::logger::Logger;
//! use memodiary::libs::state::StateStore;
//!
//! # async fn demo() -> memodiary::db::error::Result<()> {
//! let store = StateStore::new(StoreConfig::default(), Logger::stdout(false));
//! let _subscription = store.subscribe(|change| println!("{} -> {}", change.from, change.to));
//!
//! store.initialize().await?;
//! let executor = store.executor();
//! let count: Option<(i64,)> = executor.query_one("SELECT COUNT(*) FROM memos", vec![]).await?;
//! # Ok(())
//! # }
//! ```

use crate::db::connection::ConnectionManager;
use crate::db::error::{DatabaseError, Result};
use crate::db::executor::QueryExecutor;
use crate::db::migrations::{MigrationRecord, MigrationRunner, MigrationStatus};
use crate::libs::config::StoreConfig;
use crate::libs::logger::Logger;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info, msg_warning};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex as AsyncMutex};

/// Where the store is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DatabaseState {
    Uninitialized,
    Initializing,
    Ready,
    Resetting,
    Error,
}

impl DatabaseState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: DatabaseState) -> bool {
        use DatabaseState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Ready)
                | (Initializing, Error)
                | (Ready, Resetting)
                | (Error, Resetting)
                | (Error, Initializing)
                | (Resetting, Uninitialized)
                | (Resetting, Error)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseState::Uninitialized => "uninitialized",
            DatabaseState::Initializing => "initializing",
            DatabaseState::Ready => "ready",
            DatabaseState::Resetting => "resetting",
            DatabaseState::Error => "error",
        }
    }
}

impl fmt::Display for DatabaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition that has just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: DatabaseState,
    pub to: DatabaseState,
}

type Listener = Arc<dyn Fn(StateChange) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Keeps a listener registered; dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Unregisters the listener now.
    pub fn unsubscribe(self) {}

    fn detach(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Coordinates opening, migrating and wiping the local database.
pub struct StateStore {
    config: StoreConfig,
    connection: ConnectionManager,
    migrations: Arc<MigrationRunner>,
    state: watch::Sender<DatabaseState>,
    listeners: Arc<Mutex<Listeners>>,
    lifecycle: AsyncMutex<()>,
    attempts: AtomicU64,
    logger: Logger,
}

impl StateStore {
    /// Store over the built-in schema.
    pub fn new(config: StoreConfig, logger: Logger) -> Self {
        let migrations = MigrationRunner::new(logger.clone());
        Self::with_migrations(config, migrations, logger)
    }

    /// Store over a custom migration sequence.
    pub fn with_migrations(config: StoreConfig, migrations: MigrationRunner, logger: Logger) -> Self {
        let connection = ConnectionManager::new(&config, logger.clone());
        let (state, _) = watch::channel(DatabaseState::Uninitialized);
        Self {
            config,
            connection,
            migrations: Arc::new(migrations),
            state,
            listeners: Arc::new(Mutex::new(Listeners::default())),
            lifecycle: AsyncMutex::new(()),
            attempts: AtomicU64::new(0),
            logger,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn state(&self) -> DatabaseState {
        *self.state.borrow()
    }

    /// Receiver that always holds the latest state.
    pub fn watch(&self) -> watch::Receiver<DatabaseState> {
        self.state.subscribe()
    }

    /// Resolves once the store is `Ready`. Does not start initialization.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut receiver = self.watch();
        receiver
            .wait_for(|state| *state == DatabaseState::Ready)
            .await
            .map(|_| ())
            .map_err(|_| DatabaseError::NotReady { state: self.state() })
    }

    /// Registers `listener` for every subsequent transition.
    pub fn subscribe(&self, listener: impl Fn(StateChange) + Send + Sync + 'static) -> Subscription {
        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Query executor bound to this store's connection and state.
    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(self.connection.clone(), self.watch(), self.config.query_timeout(), self.logger.clone())
    }

    /// Opens the database and brings the schema up to date.
    ///
    /// A no-op while `Ready`. Concurrent callers are serialised; a caller
    /// that waited on another caller's failed attempt gets
    /// [`DatabaseError::NotReady`] instead of starting a second one.
    pub async fn initialize(&self) -> Result<()> {
        let seen = self.attempts.load(Ordering::SeqCst);
        let _lifecycle = self.lifecycle.lock().await;

        let state = self.state();
        if state == DatabaseState::Ready {
            msg_debug!(self.logger, Message::StoreAlreadyReady);
            return Ok(());
        }
        if state == DatabaseState::Error && self.attempts.load(Ordering::SeqCst) != seen {
            msg_info!(self.logger, Message::StoreInitJoined(state));
            return Err(DatabaseError::NotReady { state });
        }

        self.transition(DatabaseState::Initializing);
        msg_info!(self.logger, Message::StoreInitializing(self.connection.path().display().to_string()));

        let outcome = self.bring_up().await;
        self.attempts.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(version) => {
                self.transition(DatabaseState::Ready);
                msg_info!(self.logger, Message::StoreReady(version));
                Ok(())
            }
            Err(e) => {
                msg_error!(self.logger, Message::StoreInitFailed(e.to_string()));
                if let Err(close_error) = self.connection.close(self.config.reset_timeout()).await {
                    msg_warning!(self.logger, Message::ConnectionCloseFailed(close_error.to_string()));
                }
                self.transition(DatabaseState::Error);
                Err(e)
            }
        }
    }

    /// Closes the connection and deletes the database files.
    ///
    /// A no-op while `Uninitialized`. Waits up to `reset_timeout_ms` for
    /// in-flight queries; when they do not finish it fails with
    /// [`DatabaseError::Busy`] and the state is left unchanged.
    pub async fn reset(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        match self.state() {
            DatabaseState::Uninitialized => {
                msg_debug!(self.logger, Message::StoreResetSkipped);
                return Ok(());
            }
            DatabaseState::Ready | DatabaseState::Error => {}
            state => return Err(DatabaseError::NotReady { state }),
        }

        let closed = self.connection.close(self.config.reset_timeout()).await;
        if let Err(e @ DatabaseError::Busy { .. }) = closed {
            msg_warning!(self.logger, Message::StoreResetFailed(e.to_string()));
            return Err(e);
        }

        self.transition(DatabaseState::Resetting);
        msg_info!(self.logger, Message::StoreResetting);

        match closed.and_then(|_| self.connection.wipe()) {
            Ok(()) => {
                self.transition(DatabaseState::Uninitialized);
                msg_info!(self.logger, Message::StoreResetCompleted);
                Ok(())
            }
            Err(e) => {
                msg_error!(self.logger, Message::StoreResetFailed(e.to_string()));
                self.transition(DatabaseState::Error);
                Err(e)
            }
        }
    }

    /// Schema version of the open database against the latest known one.
    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        let runner = Arc::clone(&self.migrations);
        self.executor()
            .with_reader("migration status", move |conn| runner.status(conn))
            .await
    }

    /// Migrations applied to the open database, oldest first.
    pub async fn migration_history(&self) -> Result<Vec<MigrationRecord>> {
        let runner = Arc::clone(&self.migrations);
        self.executor()
            .with_reader("migration history", move |conn| runner.history(conn))
            .await
    }

    async fn bring_up(&self) -> Result<u32> {
        let connection = self.connection.clone();
        let handle = tokio::task::spawn_blocking(move || connection.open())
            .await
            .map_err(|e| DatabaseError::connection(self.connection.path(), e))??;

        let runner = Arc::clone(&self.migrations);
        let mut writer = handle.writer().lock_owned().await;
        let report = tokio::task::spawn_blocking(move || match writer.as_mut() {
            Some(conn) => runner.run(conn),
            None => Err(DatabaseError::NotReady {
                state: DatabaseState::Initializing,
            }),
        })
        .await
        .map_err(|e| DatabaseError::Migration {
            version: self.migrations.latest_version(),
            reason: Message::WorkerFailed(e.to_string()).to_string(),
            source: None,
        })??;

        Ok(report.current_version)
    }

    fn transition(&self, to: DatabaseState) {
        let mut change = None;
        self.state.send_if_modified(|current| {
            if !current.can_transition_to(to) {
                return false;
            }
            change = Some(StateChange { from: *current, to });
            *current = to;
            true
        });

        match change {
            Some(change) => {
                msg_debug!(self.logger, Message::StateChanged(change.from, change.to));
                self.notify(change);
            }
            None => {
                let from = self.state();
                msg_error!(self.logger, Message::IllegalTransition(from, to));
                if cfg!(debug_assertions) {
                    panic!("illegal database state transition {from} -> {to}");
                }
            }
        }
    }

    fn notify(&self, change: StateChange) {
        // listeners may subscribe or unsubscribe from inside the callback
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(change);
        }
    }
}
