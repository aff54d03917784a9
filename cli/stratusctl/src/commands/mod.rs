//! CLI commands.

mod kinds;
mod plan;
mod records;
mod up;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// stratus - declare cloud resources, apply them in dependency order.
#[derive(Debug, Parser)]
#[command(name = "stratus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show what an apply would do, without touching any provider.
    Plan(plan::PlanCommand),

    /// Apply a stack: provision declared resources, tear down orphans.
    Up(up::UpCommand),

    /// Show recorded state from previous runs.
    State(records::StateCommand),

    /// List the resource kinds the simulated providers support.
    Kinds(kinds::KindsCommand),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let format = OutputFormat::parse(&self.format)?;
        match self.command {
            Commands::Plan(cmd) => cmd.run(format),
            Commands::Up(cmd) => cmd.run(format).await,
            Commands::State(cmd) => cmd.run(format),
            Commands::Kinds(cmd) => cmd.run(format),
        }
    }
}
