//! # Memodiary - local diary store
//!
//! The embedded SQLite mirror behind a journaling app: memos archived into
//! daily diaries with mood tracking, kept on the device so it survives
//! restarts and answers statistics queries without a network round-trip.
//!
//! ## Features
//!
//! - **Guarded Lifecycle**: `initialize()`/`reset()` through an explicit state machine
//! - **Versioned Migrations**: Applied once each, atomically per version
//! - **Query Executor**: Parameterised reads, writes and transactions with timeouts
//! - **Statistics**: Mood heatmaps, mood distributions and tag frequencies
//! - **Repositories**: Typed access to memos and diaries
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memodiary::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod commands;
pub mod db;
pub mod libs;
