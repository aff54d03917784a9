//! Plan command: diff the stack file against recorded state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use stratus_engine::{Engine, EngineConfig, StateStore};
use stratus_provider::SimCloud;

use crate::output::{print_plan, OutputFormat};
use crate::state::{load_stack, state_path};

/// Show what an apply would do, without touching any provider.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Stack file path (TOML).
    #[arg(short = 'f', long, value_name = "PATH", default_value = "stack.toml")]
    pub file: PathBuf,

    /// Stack config values, repeatable (key=value).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Reconciliation state file (defaults to the user data dir).
    #[arg(long, value_name = "PATH")]
    pub state_path: Option<PathBuf>,
}

impl PlanCommand {
    pub fn run(self, format: OutputFormat) -> Result<()> {
        let decl = load_stack(&self.file, &self.set)?;
        let store = Arc::new(StateStore::open(state_path(self.state_path.as_deref())?)?);

        let cloud = Arc::new(SimCloud::new());
        let engine = Engine::new(cloud.registry(), store, EngineConfig::default());

        let plan = engine.plan(&decl)?;
        print_plan(&plan, format);
        Ok(())
    }
}
