//! Output formatting for CLI commands.

use colored::Colorize;
use serde::Serialize;
use stratus_engine::{FinalState, Plan, PlannedAction, RunReport};
use tabled::{Table, Tabled};

/// Output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown output format '{other}' (expected table or json)"),
        }
    }
}

/// Print data in the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

#[derive(Debug, Serialize, Tabled)]
pub struct PlanRow {
    #[tabled(rename = "RESOURCE")]
    pub name: String,
    #[tabled(rename = "KIND")]
    pub kind: String,
    #[tabled(rename = "ACTION")]
    pub action: String,
}

/// Render a plan, one row per step in apply order.
pub fn print_plan(plan: &Plan, format: OutputFormat) {
    let rows: Vec<PlanRow> = plan
        .entries
        .iter()
        .map(|e| PlanRow {
            name: e.name.to_string(),
            kind: e.kind.clone(),
            action: planned_action_label(e.action),
        })
        .collect();
    print_output(&rows, format);

    if matches!(format, OutputFormat::Table) {
        println!(
            "\nPlan: {} to create, {} to update, {} to delete, {} unchanged.",
            plan.count(PlannedAction::Create),
            plan.count(PlannedAction::Update),
            plan.count(PlannedAction::Delete),
            plan.count(PlannedAction::Noop),
        );
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct NodeRow {
    #[tabled(rename = "RESOURCE")]
    pub name: String,
    #[tabled(rename = "KIND")]
    pub kind: String,
    #[tabled(rename = "ACTION")]
    pub action: String,
    #[tabled(rename = "STATE")]
    pub state: String,
    #[tabled(rename = "DETAIL")]
    pub detail: String,
}

/// Render a run report: a row per node, then the tallies.
pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
        OutputFormat::Table => {
            let rows: Vec<NodeRow> = report
                .nodes
                .values()
                .map(|n| NodeRow {
                    name: n.name.to_string(),
                    kind: n.kind.clone(),
                    action: format!("{:?}", n.action).to_lowercase(),
                    state: state_label(n.state),
                    detail: n.cause.clone().unwrap_or_default(),
                })
                .collect();
            print_output(&rows, format);

            println!(
                "\nRun {}: {} ready, {} failed, {} skipped, {} interrupted.",
                report.run_id,
                report.count(FinalState::Ready),
                report.count(FinalState::Failed),
                report.count(FinalState::Skipped),
                report.count(FinalState::Interrupted),
            );
        }
    }
}

fn planned_action_label(action: PlannedAction) -> String {
    match action {
        PlannedAction::Create => "create".green().to_string(),
        PlannedAction::Update => "update".yellow().to_string(),
        PlannedAction::Delete => "delete".red().to_string(),
        PlannedAction::Noop => "noop".dimmed().to_string(),
    }
}

fn state_label(state: FinalState) -> String {
    match state {
        FinalState::Ready => "ready".green().to_string(),
        FinalState::Failed => "failed".red().to_string(),
        FinalState::Skipped => "skipped".yellow().to_string(),
        FinalState::Interrupted => "interrupted".yellow().to_string(),
    }
}
