use crate::{
    libs::{messages::Message, view::View},
    msg_print,
};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct MigrationsArgs {
    #[command(subcommand)]
    command: MigrationsCommand,
}

#[derive(Debug, Subcommand)]
enum MigrationsCommand {
    /// Current schema version
    Status,
    /// Applied migrations, oldest first
    History,
}

pub async fn cmd(args: MigrationsArgs) -> Result<()> {
    let store = super::ready_store().await?;

    match args.command {
        MigrationsCommand::Status => {
            let status = store.migration_status().await?;

            msg_print!(Message::DatabaseVersion(status.current_version));
            if status.is_up_to_date() {
                msg_print!(Message::DatabaseUpToDate);
            } else {
                msg_print!(Message::DatabaseNeedsUpdate(status.current_version, status.latest_version));
            }
        }
        MigrationsCommand::History => {
            let history = store.migration_history().await?;

            msg_print!(Message::MigrationHistory, true);
            if history.is_empty() {
                msg_print!(Message::NoMigrationsApplied);
            } else {
                View::migrations(&history)?;
            }
        }
    }

    Ok(())
}
