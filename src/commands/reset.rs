use crate::{
    libs::messages::Message,
    msg_print, msg_success,
};
use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

#[derive(Debug, Args)]
pub struct ResetArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

pub async fn cmd(args: ResetArgs) -> Result<()> {
    let store = super::store()?;
    let path = store.config().database_path().display().to_string();

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::ConfirmReset(path).to_string())
            .default(false)
            .interact()?;
        if !confirmed {
            msg_print!(Message::ResetCancelled);
            return Ok(());
        }
    }

    // a database that fails to open or migrate ends up in Error, which reset() accepts;
    // the failure itself is logged by the store
    let _ = store.initialize().await;
    store.reset().await?;

    msg_success!(Message::ResetCompleted);
    Ok(())
}
