//! Dry-run planning: what a run would do, with zero provider calls.

use serde::Serialize;
use stratus_id::ResourceName;

/// Action a run would take for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    /// No reconciliation record exists.
    Create,

    /// The declaration changed since the last apply.
    Update,

    /// The declaration hash matches the stored record.
    Noop,

    /// Recorded but no longer declared; would be torn down.
    Delete,
}

/// One planned step.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub name: ResourceName,
    pub kind: String,
    pub action: PlannedAction,
}

/// Ordered plan: declared resources in dependency order, then orphan
/// deletions children-first.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub stack: String,
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    /// True when applying would make no provider mutations.
    pub fn is_noop(&self) -> bool {
        self.entries.iter().all(|e| e.action == PlannedAction::Noop)
    }

    pub fn count(&self, action: PlannedAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }
}
