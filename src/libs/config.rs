//! Store configuration.
//!
//! Settings live in `config.json` inside the platform data directory resolved
//! by [`DataStorage`]. A missing file is not an error: the defaults below are
//! used, and `memodiary init` writes them out on first run.
//!
//! ## Defaults
//!
//! - **Database file**: `memodiary.db` next to the configuration file
//! - **Query timeout**: 5 seconds per statement or transaction
//! - **Busy timeout**: 5 seconds of SQLite lock retry
//! - **Reset timeout**: 10 seconds to let in-flight queries drain
//! - **Read pool**: 2 read-only snapshot connections
//!
//! ## Usage
//!
//! ```rust,no_run
//! use memodiary::libs::config::StoreConfig;
//!
//! let config = StoreConfig::read()?;
//! println!("database: {}", config.database_path().display());
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::data_storage::DataStorage;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration file name inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default database file name inside the data directory.
pub const DB_FILE_NAME: &str = "memodiary.db";

const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RESET_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_READ_POOL_SIZE: usize = 2;

/// Settings for the local store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoreConfig {
    /// Database file. Relative paths resolve against the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: PathBuf,

    /// Default per-call timeout for the query executor, in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// How long SQLite retries a locked database before giving up, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// How long `reset()` waits for in-flight queries, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Number of read-only snapshot connections. Zero routes reads through the writer.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

fn default_database_file() -> PathBuf {
    PathBuf::from(DB_FILE_NAME)
}

const fn default_query_timeout_ms() -> u64 {
    DEFAULT_QUERY_TIMEOUT_MS
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

const fn default_reset_timeout_ms() -> u64 {
    DEFAULT_RESET_TIMEOUT_MS
}

const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_file: default_database_file(),
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }
}

impl StoreConfig {
    /// Defaults bound to an explicit database file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            database_file: path.into(),
            ..StoreConfig::default()
        }
    }

    /// Reads `config.json`, falling back to defaults when it does not exist.
    pub fn read() -> Result<StoreConfig> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if !config_file_path.exists() {
            return Ok(StoreConfig::default());
        }

        let config_str = fs::read_to_string(config_file_path)?;
        let config: StoreConfig = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    /// Absolute database path; relative files resolve against the data directory.
    pub fn database_path(&self) -> PathBuf {
        if self.database_file.is_absolute() || self.database_file.as_os_str() == crate::db::connection::IN_MEMORY {
            return self.database_file.clone();
        }
        DataStorage::new().base_path().join(&self.database_file)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}
