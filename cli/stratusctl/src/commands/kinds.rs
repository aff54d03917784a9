//! Kinds command: list supported resource kinds.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use stratus_provider::SIM_KINDS;
use tabled::Tabled;

use crate::output::{print_output, OutputFormat};

/// List the resource kinds the simulated providers support.
#[derive(Debug, Args)]
pub struct KindsCommand {}

#[derive(Debug, Serialize, Tabled)]
struct KindRow {
    #[tabled(rename = "KIND")]
    kind: String,
}

impl KindsCommand {
    pub fn run(self, format: OutputFormat) -> Result<()> {
        let rows: Vec<KindRow> = SIM_KINDS
            .iter()
            .map(|k| KindRow {
                kind: k.to_string(),
            })
            .collect();
        print_output(&rows, format);
        Ok(())
    }
}
