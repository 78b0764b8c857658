use crate::{
    libs::{config::StoreConfig, messages::Message},
    msg_print, msg_success,
};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Database file; relative paths resolve against the data directory
    #[arg(short, long)]
    database: Option<std::path::PathBuf>,
}

pub async fn cmd(init_args: InitArgs) -> Result<()> {
    // Keep whatever is already configured and only override what was passed
    let mut config = StoreConfig::read()?;
    if let Some(database) = init_args.database {
        config.database_file = database;
    }
    config.save()?;

    let store = super::store()?;
    store.initialize().await?;
    let status = store.migration_status().await?;

    msg_success!(Message::StoreInitialized(config.database_path().display().to_string()));
    msg_print!(Message::DatabaseVersion(status.current_version));
    Ok(())
}
