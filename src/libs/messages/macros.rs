//! Macros for logging and printing [`Message`](super::Message)s.
//!
//! ## Macro Categories
//!
//! ### Logging Macros
//! Take the component's [`Logger`](crate::libs::logger::Logger) first and emit
//! a `tracing` event on that logger's dispatch:
//! - **`msg_error!`**, **`msg_warning!`**, **`msg_info!`**, **`msg_debug!`**
//!
//! ### Display Macros
//! Console output for the CLI:
//! - **`msg_print!`**: Plain line on stdout
//! - **`msg_success!`**: Success notification with ✅ prefix
//!
//! ### Error Handling Macros
//! - **`msg_error_anyhow!`**: Create anyhow::Error from a message
//! - **`msg_bail_anyhow!`**: Early return with that error
//!
//! ## Usage Examples
//!
//! ```rust
//! use memodiary::libs::logger::Logger;
//! use memodiary::libs::messages::Message;
//! use memodiary::{msg_info, msg_warning};
//!
//! let (logger, capture) = Logger::capturing();
//! msg_info!(logger, Message::StoreReady(2));
//! msg_warning!(logger, Message::TagsRowSkipped("m1".into(), "expected value".into()));
//! assert_eq!(capture.lines_containing("WARN").len(), 1);
//! ```

/// Logs an error-level message on the given logger.
#[macro_export]
macro_rules! msg_error {
    ($logger:expr, $msg:expr) => {
        $logger.in_scope(|| ::tracing::error!("{}", $msg))
    };
}

/// Logs a warning-level message on the given logger.
#[macro_export]
macro_rules! msg_warning {
    ($logger:expr, $msg:expr) => {
        $logger.in_scope(|| ::tracing::warn!("{}", $msg))
    };
}

/// Logs an info-level message on the given logger.
#[macro_export]
macro_rules! msg_info {
    ($logger:expr, $msg:expr) => {
        $logger.in_scope(|| ::tracing::info!("{}", $msg))
    };
}

/// Logs a debug-level message on the given logger.
///
/// Hidden unless the logger was built verbose (`MEMODIARY_DEBUG` or `RUST_LOG`).
#[macro_export]
macro_rules! msg_debug {
    ($logger:expr, $msg:expr) => {
        $logger.in_scope(|| ::tracing::debug!("{}", $msg))
    };
}

/// Prints a message on stdout.
///
/// ```rust
/// use memodiary::msg_print;
/// use memodiary::libs::messages::Message;
///
/// msg_print!(Message::TagsHeader);
/// msg_print!(Message::MigrationHistory, true);
/// ```
#[macro_export]
macro_rules! msg_print {
    ($msg:expr) => {
        println!("{}", $msg)
    };
    ($msg:expr, true) => {
        println!("\n{}\n", $msg)
    };
}

/// Prints a success message with ✅ prefix.
#[macro_export]
macro_rules! msg_success {
    ($msg:expr) => {
        println!("✅ {}", $msg)
    };
    ($msg:expr, true) => {
        println!("\n✅ {}\n", $msg)
    };
}

/// Creates an `anyhow::Error` from a message with ❌ prefix.
#[macro_export]
macro_rules! msg_error_anyhow {
    ($msg:expr) => {
        anyhow::anyhow!("❌ {}", $msg)
    };
}

/// Early return with an error created from a message.
#[macro_export]
macro_rules! msg_bail_anyhow {
    ($msg:expr) => {
        anyhow::bail!("❌ {}", $msg)
    };
}
