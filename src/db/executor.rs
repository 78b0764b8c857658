//! Parameterised SQL execution with timeouts.
//!
//! [`QueryExecutor`] is the only component that issues SQL against the open
//! [`DatabaseHandle`](crate::db::connection::DatabaseHandle). Every call runs
//! on tokio's blocking pool and carries a deadline; when the deadline passes the
//! in-flight statement is interrupted, the worker is awaited so the connection
//! is handed back intact, and [`DatabaseError::Timeout`] is returned.
//!
//! ## Routing
//!
//! - **Reads** (`query_all`, `query_one`) run on a read-only snapshot connection,
//!   so they see either the state before a concurrent transaction or the state
//!   after it commits
//! - **Writes** (`execute`, `transaction`) run on the single writer connection and
//!   queue behind each other
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memodiary::db::executor::QueryExecutor;
//! use memodiary::sql_params;
//!
//! # async fn demo(executor: QueryExecutor) -> memodiary::db::error::Result<()> {
//! let moods: Vec<(String, i64)> = executor
//!     .query_all("SELECT mood_key, mood_score FROM diaries WHERE date >= ?1", sql_params!["2024-01-01".to_string()])
//!     .await?;
//!
//! executor
//!     .transaction(|tx| {
//!         tx.execute("UPDATE memos SET is_archived = 1 WHERE id = ?1", sql_params!["m1".to_string()])?;
//!         tx.execute("UPDATE diaries SET summary = ?1 WHERE date = ?2", sql_params!["done".to_string(), "2024-01-01".to_string()])?;
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::db::connection::{ConnectionManager, DatabaseHandle, Slot};
use crate::db::error::{DatabaseError, Result};
use crate::libs::logger::Logger;
use crate::libs::messages::Message;
use crate::libs::state::DatabaseState;
use crate::{msg_debug, msg_error, msg_warning};
use rusqlite::types::FromSql;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub use rusqlite::types::Value;

/// Owned statement parameters, bound positionally (`?1`, `?2`, ...).
pub type Params = Vec<Value>;

/// Builds [`Params`] from values convertible into [`Value`].
///
/// ```rust
/// use memodiary::sql_params;
///
/// let params = sql_params!["2024-01-01".to_string(), 8, Option::<String>::None];
/// assert_eq!(params.len(), 3);
/// ```
#[macro_export]
macro_rules! sql_params {
    () => {
        ::std::vec::Vec::<$crate::db::executor::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::db::executor::Value::from($value)),+]
    };
}

/// Maps a result row onto a Rust value.
pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

macro_rules! impl_from_row_for_tuple {
    ($($name:ident $index:tt),+) => {
        impl<$($name: FromSql),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
                Ok(($(row.get::<_, $name>($index)?,)+))
            }
        }
    };
}

impl_from_row_for_tuple!(A 0);
impl_from_row_for_tuple!(A 0, B 1);
impl_from_row_for_tuple!(A 0, B 1, C 2);
impl_from_row_for_tuple!(A 0, B 1, C 2, D 3);
impl_from_row_for_tuple!(A 0, B 1, C 2, D 3, E 4);

#[derive(Debug, Clone, Copy)]
enum Route {
    Read,
    Write,
}

/// Executes SQL against the store's single connection handle.
#[derive(Clone)]
pub struct QueryExecutor {
    connection: ConnectionManager,
    state: watch::Receiver<DatabaseState>,
    default_timeout: Duration,
    logger: Logger,
}

impl QueryExecutor {
    pub(crate) fn new(connection: ConnectionManager, state: watch::Receiver<DatabaseState>, default_timeout: Duration, logger: Logger) -> Self {
        Self {
            connection,
            state,
            default_timeout,
            logger,
        }
    }

    /// Timeout applied when a call does not specify one.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// All rows matching `sql`.
    pub async fn query_all<T>(&self, sql: &str, params: Params) -> Result<Vec<T>>
    where
        T: FromRow + Send + 'static,
    {
        self.query_all_with_timeout(sql, params, self.default_timeout).await
    }

    pub async fn query_all_with_timeout<T>(&self, sql: &str, params: Params, timeout: Duration) -> Result<Vec<T>>
    where
        T: FromRow + Send + 'static,
    {
        let statement = sql.to_string();
        self.run(Route::Read, sql, timeout, move |conn, _| select_all(conn, &statement, &params))
            .await
    }

    /// The first row matching `sql`, or `None`.
    pub async fn query_one<T>(&self, sql: &str, params: Params) -> Result<Option<T>>
    where
        T: FromRow + Send + 'static,
    {
        self.query_one_with_timeout(sql, params, self.default_timeout).await
    }

    pub async fn query_one_with_timeout<T>(&self, sql: &str, params: Params, timeout: Duration) -> Result<Option<T>>
    where
        T: FromRow + Send + 'static,
    {
        let statement = sql.to_string();
        self.run(Route::Read, sql, timeout, move |conn, _| select_one(conn, &statement, &params))
            .await
    }

    /// Runs a single write statement and returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: Params) -> Result<usize> {
        self.execute_with_timeout(sql, params, self.default_timeout).await
    }

    pub async fn execute_with_timeout(&self, sql: &str, params: Params, timeout: Duration) -> Result<usize> {
        let statement = sql.to_string();
        self.run(Route::Write, sql, timeout, move |conn, _| execute(conn, &statement, &params))
            .await
    }

    /// Runs `work` inside a transaction on the writer connection.
    ///
    /// Commits when `work` returns `Ok`, rolls back and returns the error
    /// unchanged when it returns `Err`. Calls to [`Transaction::transaction`]
    /// inside `work` join this transaction.
    pub async fn transaction<R, F>(&self, work: F) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.transaction_with_timeout(work, self.default_timeout).await
    }

    pub async fn transaction_with_timeout<R, F>(&self, work: F, timeout: Duration) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let logger = self.logger.clone();
        self.run(Route::Write, "BEGIN", timeout, move |conn, cancelled| {
            let tx = conn
                .transaction()
                .map_err(|e| DatabaseError::transaction(Message::TransactionBeginFailed.to_string(), Some(DatabaseError::query("BEGIN", &[], e))))?;
            let scope = Transaction {
                conn: &tx,
                cancelled,
                timeout,
            };

            match work(&scope) {
                Ok(value) if !cancelled.load(Ordering::SeqCst) => {
                    tx.commit()
                        .map_err(|e| DatabaseError::transaction(Message::TransactionCommitFailed.to_string(), Some(DatabaseError::query("COMMIT", &[], e))))?;
                    Ok(value)
                }
                Ok(_) => {
                    rollback(tx, &logger);
                    Err(DatabaseError::Timeout { timeout })
                }
                Err(e) => {
                    msg_debug!(logger, Message::TransactionRolledBack(e.to_string()));
                    rollback(tx, &logger);
                    Err(e)
                }
            }
        })
        .await
    }

    /// Runs `work` against a read connection under the default timeout.
    pub(crate) async fn with_reader<R, F>(&self, label: &str, work: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.run(Route::Read, label, self.default_timeout, move |conn, _| work(conn))
            .await
    }

    /// The open handle, refusing new work while the store is not `Ready` or is draining for a reset.
    fn ready_handle(&self) -> Result<Arc<DatabaseHandle>> {
        let state = *self.state.borrow();
        if state != DatabaseState::Ready {
            return Err(DatabaseError::NotReady { state });
        }
        match self.connection.handle() {
            Some(handle) if !self.connection.is_draining() => Ok(handle),
            _ => Err(DatabaseError::Busy {
                what: Message::ConnectionDraining.to_string(),
            }),
        }
    }

    async fn run<R, F>(&self, route: Route, sql: &str, timeout: Duration, work: F) -> Result<R>
    where
        F: FnOnce(&mut Connection, &AtomicBool) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let result = self.run_inner(route, sql, timeout, work).await;
        if let Err(e) = &result {
            msg_error!(self.logger, Message::QueryFailed(e.code(), e.to_string()));
        }
        result
    }

    async fn run_inner<R, F>(&self, route: Route, sql: &str, timeout: Duration, work: F) -> Result<R>
    where
        F: FnOnce(&mut Connection, &AtomicBool) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        let slot: Slot = {
            let handle = self.ready_handle()?;
            match route {
                Route::Read => handle.reader(),
                Route::Write => handle.writer(),
            }
        };

        let guard = match tokio::time::timeout_at(deadline, slot.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                msg_warning!(self.logger, Message::QueryTimedOut(sql.to_string(), timeout));
                return Err(DatabaseError::Timeout { timeout });
            }
        };
        // reset() may have closed the connection while this call was queued
        let interrupt = match guard.as_ref() {
            Some(conn) => conn.get_interrupt_handle(),
            None => {
                return Err(DatabaseError::Busy {
                    what: Message::ConnectionDraining.to_string(),
                })
            }
        };

        msg_debug!(self.logger, Message::QueryStarted(sql.to_string()));
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let mut task = tokio::task::spawn_blocking(move || {
            // the blocking pool may start this worker after the deadline
            if flag.load(Ordering::SeqCst) {
                return Err(DatabaseError::Timeout { timeout });
            }
            let mut guard = guard;
            match guard.as_mut() {
                Some(conn) => work(conn, &flag),
                None => Err(DatabaseError::Busy {
                    what: Message::ConnectionDraining.to_string(),
                }),
            }
        });

        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(joined) => joined.map_err(|e| DatabaseError::transaction(Message::WorkerFailed(e.to_string()).to_string(), None))?,
            Err(_) => {
                cancelled.store(true, Ordering::SeqCst);
                interrupt.interrupt();
                msg_warning!(self.logger, Message::QueryTimedOut(sql.to_string(), timeout));
                // the worker still owns the connection; wait until it lets go
                let _ = task.await;
                Err(DatabaseError::Timeout { timeout })
            }
        }
    }
}

/// A transaction in progress on the writer connection.
///
/// Handed to the closure given to [`QueryExecutor::transaction`]. Statements
/// issued through it see the transaction's own uncommitted writes.
pub struct Transaction<'a> {
    conn: &'a Connection,
    cancelled: &'a AtomicBool,
    timeout: Duration,
}

impl Transaction<'_> {
    pub fn query_all<T: FromRow>(&self, sql: &str, params: Params) -> Result<Vec<T>> {
        self.check_deadline()?;
        select_all(self.conn, sql, &params)
    }

    pub fn query_one<T: FromRow>(&self, sql: &str, params: Params) -> Result<Option<T>> {
        self.check_deadline()?;
        select_one(self.conn, sql, &params)
    }

    pub fn execute(&self, sql: &str, params: Params) -> Result<usize> {
        self.check_deadline()?;
        execute(self.conn, sql, &params)
    }

    /// Nested transactions join the enclosing one.
    pub fn transaction<R>(&self, work: impl FnOnce(&Transaction<'_>) -> Result<R>) -> Result<R> {
        work(self)
    }

    fn check_deadline(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(DatabaseError::Timeout { timeout: self.timeout });
        }
        Ok(())
    }
}

fn rollback(tx: rusqlite::Transaction<'_>, logger: &Logger) {
    if let Err(e) = tx.rollback() {
        msg_error!(logger, Message::TransactionRollbackFailed(e.to_string()));
    }
}

fn select_all<T: FromRow>(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<T>> {
    let wrap = |e| DatabaseError::query(sql, params, e);
    let mut stmt = conn.prepare_cached(sql).map_err(wrap)?;
    let rows = stmt.query_map(params_from_iter(params.iter()), T::from_row).map_err(wrap)?;
    rows.collect::<rusqlite::Result<Vec<T>>>().map_err(wrap)
}

fn select_one<T: FromRow>(conn: &Connection, sql: &str, params: &[Value]) -> Result<Option<T>> {
    let wrap = |e| DatabaseError::query(sql, params, e);
    let mut stmt = conn.prepare_cached(sql).map_err(wrap)?;
    stmt.query_row(params_from_iter(params.iter()), T::from_row).optional().map_err(wrap)
}

fn execute(conn: &Connection, sql: &str, params: &[Value]) -> Result<usize> {
    let wrap = |e| DatabaseError::query(sql, params, e);
    let mut stmt = conn.prepare_cached(sql).map_err(wrap)?;
    stmt.execute(params_from_iter(params.iter())).map_err(wrap)
}
