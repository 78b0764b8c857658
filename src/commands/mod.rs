//! Command-line interface for maintaining the local store.
//!
//! Each subcommand lives in its own module with an `Args` struct and a
//! `cmd` entry point; [`Cli::menu`] parses the arguments and dispatches.
//!
//! ## Available Commands
//!
//! - **`init`**: Write the default configuration and create or migrate the database
//! - **`reset`**: Delete the local database after confirmation
//! - **`migrations`**: Show the schema version or the migration history
//! - **`heatmap`**, **`tags`**, **`moods`**: Print statistics

pub mod init;
pub mod migrations;
pub mod reset;
pub mod stats;

use crate::libs::config::StoreConfig;
use crate::libs::logger::{is_debug_mode, Logger};
use crate::libs::state::StateStore;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create the local store and apply migrations")]
    Init(init::InitArgs),
    #[command(about = "Delete the local store")]
    Reset(reset::ResetArgs),
    #[command(about = "Inspect schema migrations", arg_required_else_help = true)]
    Migrations(migrations::MigrationsArgs),
    #[command(about = "Mood heatmap for a date range")]
    Heatmap(stats::HeatMapArgs),
    #[command(about = "Tag frequencies")]
    Tags(stats::TagsArgs),
    #[command(about = "Mood distribution for a date range")]
    Moods(stats::MoodsArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Init(args) => init::cmd(args).await,
            Commands::Reset(args) => reset::cmd(args).await,
            Commands::Migrations(args) => migrations::cmd(args).await,
            Commands::Heatmap(args) => stats::heat_map(args).await,
            Commands::Tags(args) => stats::tags(args).await,
            Commands::Moods(args) => stats::moods(args).await,
        }
    }
}

/// Store built from `config.json`, not yet initialized.
pub(crate) fn store() -> Result<StateStore> {
    let config = StoreConfig::read()?;
    Ok(StateStore::new(config, Logger::stdout(is_debug_mode())))
}

/// Store built from `config.json` and brought to `Ready`.
pub(crate) async fn ready_store() -> Result<StateStore> {
    let store = store()?;
    store.initialize().await?;
    Ok(store)
}
