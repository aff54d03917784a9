//! Run reports: the per-resource outcome of an apply.

use std::collections::BTreeMap;

use serde::Serialize;
use stratus_id::{ResourceName, RunId};
use stratus_provider::Outputs;

use crate::error::EngineError;

/// Terminal state of a node after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    /// Provisioned (or confirmed in place) and outputs resolved.
    Ready,

    /// The provider call failed or timed out.
    Failed,

    /// Never attempted because a dependency failed.
    Skipped,

    /// Never attempted because the run was cancelled.
    Interrupted,
}

/// What the engine actually did to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedAction {
    Create,
    Update,
    /// Nothing to do; state matched the declaration.
    Noop,
    /// An unrecorded resource with the same name already existed and
    /// was taken under management.
    Adopt,
    Delete,
    /// No provider call was made.
    None,
}

/// Outcome of one resource node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub name: ResourceName,
    pub kind: String,
    pub action: AppliedAction,
    pub state: FinalState,
    /// Human-readable failure or skip cause, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    pub outputs: Outputs,
}

impl NodeReport {
    pub fn ready(name: ResourceName, kind: &str, action: AppliedAction, outputs: Outputs) -> Self {
        Self {
            name,
            kind: kind.to_string(),
            action,
            state: FinalState::Ready,
            cause: None,
            outputs,
        }
    }

    pub fn failed(name: ResourceName, kind: &str, cause: String) -> Self {
        Self {
            name,
            kind: kind.to_string(),
            action: AppliedAction::None,
            state: FinalState::Failed,
            cause: Some(cause),
            outputs: Outputs::new(),
        }
    }

    pub fn skipped(name: ResourceName, kind: &str, failed_dep: &ResourceName) -> Self {
        let cause = EngineError::DependencyFailed {
            resource: name.to_string(),
            failed: failed_dep.to_string(),
        };
        Self {
            name,
            kind: kind.to_string(),
            action: AppliedAction::None,
            state: FinalState::Skipped,
            cause: Some(cause.to_string()),
            outputs: Outputs::new(),
        }
    }

    pub fn interrupted(name: ResourceName, kind: &str) -> Self {
        let cause = EngineError::Interrupted(name.to_string());
        Self {
            name,
            kind: kind.to_string(),
            action: AppliedAction::None,
            state: FinalState::Interrupted,
            cause: Some(cause.to_string()),
            outputs: Outputs::new(),
        }
    }
}

/// Full result of one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub stack: String,
    pub dry_run: bool,
    /// Per-node outcomes, keyed by resource name.
    pub nodes: BTreeMap<ResourceName, NodeReport>,
}

impl RunReport {
    pub fn new(stack: impl Into<String>, dry_run: bool) -> Self {
        Self {
            run_id: RunId::new(),
            stack: stack.into(),
            dry_run,
            nodes: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, node: NodeReport) {
        self.nodes.insert(node.name.clone(), node);
    }

    /// True when every node reached Ready.
    pub fn succeeded(&self) -> bool {
        self.nodes.values().all(|n| n.state == FinalState::Ready)
    }

    pub fn count(&self, state: FinalState) -> usize {
        self.nodes.values().filter(|n| n.state == state).count()
    }
}
