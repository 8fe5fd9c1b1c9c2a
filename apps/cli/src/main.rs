//! PressWatch CLI — monitor company press-release pages for new releases.
//!
//! Checks configured sources on demand or on a staggered daily schedule,
//! deduplicates against previously seen releases, archives full content,
//! summarizes it, and sends digest notifications.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
