//! Ownership of the physical database connection.
//!
//! [`ConnectionManager`] is the only place in the crate that opens the
//! database file. It holds a single [`DatabaseHandle`]: one writer connection
//! plus a small pool of read-only WAL snapshot readers opened against the same
//! file. Everything else reaches SQLite through the handle's locks, so writes
//! are serialised and readers never observe a half-applied transaction.

use crate::db::error::{DatabaseError, Result};
use crate::libs::config::StoreConfig;
use crate::libs::logger::Logger;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Path understood by SQLite as a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// A lockable connection slot. `None` once the handle has been closed.
pub(crate) type Slot = Arc<AsyncMutex<Option<Connection>>>;

/// Opaque ownership of the open connections.
///
/// Callers never get at the raw connections; the executor and the migration
/// runner borrow them through crate-private accessors.
pub struct DatabaseHandle {
    path: PathBuf,
    writer: Slot,
    readers: Vec<Slot>,
    next_reader: AtomicUsize,
}

impl DatabaseHandle {
    /// Database file this handle is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn writer(&self) -> Slot {
        Arc::clone(&self.writer)
    }

    /// Next read slot in round-robin order; the writer when no readers exist.
    pub(crate) fn reader(&self) -> Slot {
        if self.readers.is_empty() {
            return self.writer();
        }
        let index = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        Arc::clone(&self.readers[index])
    }

    fn slots(&self) -> impl Iterator<Item = &Slot> {
        std::iter::once(&self.writer).chain(self.readers.iter())
    }
}

/// Single point of truth for the on-device database file.
#[derive(Clone)]
pub struct ConnectionManager {
    path: PathBuf,
    busy_timeout: Duration,
    read_pool_size: usize,
    handle: Arc<Mutex<Option<Arc<DatabaseHandle>>>>,
    draining: Arc<AtomicBool>,
    logger: Logger,
}

impl ConnectionManager {
    pub fn new(config: &StoreConfig, logger: Logger) -> Self {
        Self {
            path: config.database_path(),
            busy_timeout: config.busy_timeout(),
            read_pool_size: config.read_pool_size,
            handle: Arc::new(Mutex::new(None)),
            draining: Arc::new(AtomicBool::new(false)),
            logger,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// True while `close()` waits for in-flight statements.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Opens the database, or returns the handle that is already open.
    ///
    /// On failure nothing is retained: the manager stays closed.
    pub fn open(&self) -> Result<Arc<DatabaseHandle>> {
        let mut slot = self.handle.lock();
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = match self.open_handle() {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                msg_error!(self.logger, Message::ConnectionOpenFailed(self.path.display().to_string(), e.to_string()));
                return Err(e);
            }
        };
        msg_info!(self.logger, Message::ConnectionOpened(self.path.display().to_string(), handle.readers.len()));
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// The open handle, if any.
    pub(crate) fn handle(&self) -> Option<Arc<DatabaseHandle>> {
        self.handle.lock().clone()
    }

    /// Closes every connection once in-flight statements have finished.
    ///
    /// Waits at most `wait` for the connections to become free. When they do
    /// not, fails with [`DatabaseError::Busy`] and leaves the handle open.
    /// New work is refused while it waits (see [`is_draining`](Self::is_draining)).
    /// Closing an already closed manager is a no-op.
    pub async fn close(&self, wait: Duration) -> Result<()> {
        let Some(handle) = self.handle() else {
            msg_debug!(self.logger, Message::ConnectionAlreadyClosed);
            return Ok(());
        };

        self.draining.store(true, Ordering::SeqCst);
        let guards = match tokio::time::timeout(wait, Self::lock_all(&handle)).await {
            Ok(guards) => guards,
            Err(_) => {
                self.draining.store(false, Ordering::SeqCst);
                let err = DatabaseError::Busy {
                    what: Message::QueriesStillRunning(wait).to_string(),
                };
                msg_error!(self.logger, Message::ConnectionCloseFailed(err.to_string()));
                return Err(err);
            }
        };

        {
            let mut slot = self.handle.lock();
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &handle)) {
                *slot = None;
            }
        }
        self.draining.store(false, Ordering::SeqCst);

        let mut first_error = None;
        for mut guard in guards {
            if let Some(conn) = guard.take() {
                if let Err((_, e)) = conn.close() {
                    msg_error!(self.logger, Message::ConnectionCloseFailed(e.to_string()));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(DatabaseError::connection(&self.path, e)),
            None => {
                msg_info!(self.logger, Message::ConnectionClosed(self.path.display().to_string()));
                Ok(())
            }
        }
    }

    /// Removes the database file and its WAL side files.
    ///
    /// Refuses to run while the manager is open.
    pub fn wipe(&self) -> Result<()> {
        if self.is_open() {
            return Err(DatabaseError::Busy {
                what: Message::WipeWhileOpen.to_string(),
            });
        }
        if self.is_in_memory() {
            return Ok(());
        }

        for path in self.files() {
            match fs::remove_file(&path) {
                Ok(()) => msg_debug!(self.logger, Message::FileRemoved(path.display().to_string())),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    msg_error!(self.logger, Message::FileRemoveFailed(path.display().to_string(), e.to_string()));
                    return Err(DatabaseError::connection(path, e));
                }
            }
        }
        Ok(())
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY
    }

    fn files(&self) -> Vec<PathBuf> {
        let base = self.path.as_os_str().to_os_string();
        ["", "-wal", "-shm", "-journal"]
            .iter()
            .map(|suffix| {
                let mut name = base.clone();
                name.push(suffix);
                PathBuf::from(name)
            })
            .collect()
    }

    fn open_handle(&self) -> Result<DatabaseHandle> {
        if !self.is_in_memory() {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| DatabaseError::connection(&self.path, e))?;
            }
        }

        let writer = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| DatabaseError::connection(&self.path, e))?;
        self.configure_writer(&writer).map_err(|e| DatabaseError::connection(&self.path, e))?;

        let mut readers = Vec::new();
        if !self.is_in_memory() {
            for _ in 0..self.read_pool_size {
                let reader = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
                    .map_err(|e| DatabaseError::connection(&self.path, e))?;
                reader
                    .busy_timeout(self.busy_timeout)
                    .map_err(|e| DatabaseError::connection(&self.path, e))?;
                readers.push(Arc::new(AsyncMutex::new(Some(reader))));
            }
        }

        Ok(DatabaseHandle {
            path: self.path.clone(),
            writer: Arc::new(AsyncMutex::new(Some(writer))),
            readers,
            next_reader: AtomicUsize::new(0),
        })
    }

    fn configure_writer(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        if !self.is_in_memory() {
            // journal_mode returns the resulting mode as a row
            let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            msg_debug!(self.logger, Message::JournalMode(mode));
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            // touch the file so the -wal/-shm pair exists before readers attach
            conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))?;
        }
        Ok(())
    }

    async fn lock_all(handle: &DatabaseHandle) -> Vec<OwnedMutexGuard<Option<Connection>>> {
        let mut guards = Vec::new();
        for slot in handle.slots() {
            guards.push(Arc::clone(slot).lock_owned().await);
        }
        guards
    }
}
