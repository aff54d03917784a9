//! stratusctl (stratus) - CLI for the provisioning engine.
//!
//! Loads a TOML stack declaration, plans or applies it against the
//! simulated provider set, and renders the result.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod error;
mod output;
mod state;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Engine logs stay quiet unless asked for (STRATUS_LOG=debug).
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("STRATUS_LOG").unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
