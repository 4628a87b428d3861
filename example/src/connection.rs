use std::env::var;
use firebro::{Attachment, Config, Result};

pub fn main() -> Result<()> {
    let config = Config::parse(&var("DATABASE_URL").unwrap())?;
    let attachment = Attachment::connect(&config)?;
    tracing::info!(version = attachment.server_version()?, "connected");
    attachment.detach()?;

    let attachment = Attachment::connect_env()?;
    attachment.set_warning_handler(|warning| tracing::warn!("{warning}"));
    attachment.detach()?;
    assert!(attachment.is_detached());

    Ok(())
}
