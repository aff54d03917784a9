//! State command: inspect the reconciliation store.

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use stratus_engine::StateStore;
use stratus_id::ResourceName;
use tabled::Tabled;

use crate::output::{print_output, print_success, OutputFormat};
use crate::state::state_path;

/// Inspect recorded state from previous runs.
#[derive(Debug, Args)]
pub struct StateCommand {
    /// Reconciliation state file (defaults to the user data dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: StateSubcommand,
}

#[derive(Debug, Subcommand)]
enum StateSubcommand {
    /// List every recorded resource.
    List,

    /// Show one record in full (spec hash, outputs, dependencies).
    Show { resource: ResourceName },

    /// Drop a record; the next `up` treats the resource as new.
    Rm { resource: ResourceName },
}

#[derive(Debug, Serialize, Tabled)]
struct RecordRow {
    #[tabled(rename = "RESOURCE")]
    resource: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "PROVIDER ID")]
    provider_id: String,
    #[tabled(rename = "UPDATED")]
    updated_at: String,
}

impl StateCommand {
    pub fn run(self, format: OutputFormat) -> Result<()> {
        let store = StateStore::open(state_path(self.state_path.as_deref())?)?;

        match self.command {
            StateSubcommand::List => {
                let rows: Vec<RecordRow> = store
                    .load_all()?
                    .into_values()
                    .map(|rec| RecordRow {
                        resource: rec.resource.to_string(),
                        kind: rec.kind,
                        provider_id: rec.provider_id,
                        updated_at: DateTime::<Utc>::from_timestamp(rec.updated_at, 0)
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_default(),
                    })
                    .collect();
                print_output(&rows, format);
            }
            StateSubcommand::Show { resource } => {
                let Some(record) = store.get(&resource)? else {
                    bail!("no record for resource '{resource}'");
                };
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
            StateSubcommand::Rm { resource } => {
                if store.get(&resource)?.is_none() {
                    bail!("no record for resource '{resource}'");
                }
                store.delete(&resource)?;
                print_success(&format!("forgot record for '{resource}'"));
            }
        }
        Ok(())
    }
}
