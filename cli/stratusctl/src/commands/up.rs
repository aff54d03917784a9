//! Up command: apply a stack against the simulated providers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use stratus_engine::{Engine, EngineConfig, FinalState, StateStore};
use stratus_provider::SimCloud;
use tokio::sync::watch;
use tracing::warn;

use crate::error::CliError;
use crate::output::{print_info, print_report, print_success, OutputFormat};
use crate::state::{load_stack, state_path};

/// Apply a stack: provision declared resources, tear down orphans.
#[derive(Debug, Args)]
pub struct UpCommand {
    /// Stack file path (TOML).
    #[arg(short = 'f', long, value_name = "PATH", default_value = "stack.toml")]
    pub file: PathBuf,

    /// Compute and print the plan without any provider calls.
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum resources provisioning at once.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Stack config values, repeatable (key=value).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Reconciliation state file (defaults to the user data dir).
    #[arg(long, value_name = "PATH")]
    pub state_path: Option<PathBuf>,
}

impl UpCommand {
    pub async fn run(self, format: OutputFormat) -> Result<()> {
        let decl = load_stack(&self.file, &self.set)?;
        let store = Arc::new(StateStore::open(state_path(self.state_path.as_deref())?)?);

        let mut config = EngineConfig {
            dry_run: self.dry_run,
            ..EngineConfig::default()
        };
        if let Some(n) = self.concurrency {
            config.concurrency_limit = n.max(1);
        }

        let cloud = Arc::new(SimCloud::new());
        let engine = Engine::new(cloud.registry(), store, config);

        // First Ctrl-C cancels the run; in-flight calls are joined.
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                let _ = cancel_tx.send(true);
            }
        });

        if !self.dry_run {
            print_info(&format!("Applying stack '{}'", decl.stack));
        }

        let report = engine.up(&decl, cancel_rx).await?;
        print_report(&report, format);

        if report.succeeded() {
            if !report.dry_run {
                print_success("all resources ready");
            }
            Ok(())
        } else {
            Err(CliError::RunFailed {
                failed: report.count(FinalState::Failed),
                skipped: report.count(FinalState::Skipped),
                interrupted: report.count(FinalState::Interrupted),
            }
            .into())
        }
    }
}
