//! Injected logging capability.
//!
//! Every component receives a [`Logger`] at construction instead of reaching
//! for a process-wide subscriber. A `Logger` is a cheap, cloneable wrapper
//! around a [`tracing::Dispatch`]; events emitted through the `msg_*!` macros
//! are routed to that dispatch regardless of which thread (including tokio's
//! blocking pool) emits them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memodiary::libs::logger::Logger;
//! use memodiary::libs::messages::Message;
//! use memodiary::msg_info;
//!
//! let logger = Logger::stdout(false);
//! msg_info!(logger, Message::StoreReady(3));
//!
//! // Tests swap in a capturing logger
//! let (logger, capture) = Logger::capturing();
//! msg_info!(logger, Message::StoreReady(3));
//! assert!(capture.contents().contains("version 3"));
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Environment variable that switches the CLI logger to debug output.
pub const DEBUG_ENV: &str = "MEMODIARY_DEBUG";

static DEBUG_MODE: OnceLock<bool> = OnceLock::new();

/// Whether `MEMODIARY_DEBUG` or `RUST_LOG` is set; checked once per process.
pub fn is_debug_mode() -> bool {
    *DEBUG_MODE.get_or_init(|| std::env::var(DEBUG_ENV).is_ok() || std::env::var("RUST_LOG").is_ok())
}

/// Structured, leveled logging sink handed to each component.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Wraps an existing dispatch.
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// A logger that discards everything.
    pub fn disabled() -> Self {
        Self { dispatch: Dispatch::none() }
    }

    /// Snapshot of the dispatch that is current on the calling thread.
    pub fn current() -> Self {
        Self {
            dispatch: tracing::dispatcher::get_default(|dispatch| dispatch.clone()),
        }
    }

    /// Human-oriented logger writing to stderr.
    ///
    /// `RUST_LOG` wins when set; otherwise the level is `debug` when `verbose`
    /// is true and `warn` when it is not.
    pub fn stdout(verbose: bool) -> Self {
        let fallback = if verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .finish();
        Self::new(Dispatch::new(subscriber))
    }

    /// Logger that records every event (down to `TRACE`) into memory.
    pub fn capturing() -> (Self, LogCapture) {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();
        (Self::new(Dispatch::new(subscriber)), capture)
    }

    /// Runs `f` with this logger's dispatch as the thread default.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// In-memory sink shared between a capturing [`Logger`] and the test reading it.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Everything logged so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Logged lines containing `needle`.
    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
