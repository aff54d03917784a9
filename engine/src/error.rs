//! Engine error taxonomy.
//!
//! Graph-build and plan-time errors abort the run before any side
//! effect. Per-node provisioning failures are contained to the node
//! and its dependents and surface through the run report, not through
//! `Result`.

use stratus_decl::DeclError;
use stratus_graph::GraphError;
use stratus_provider::ProviderError;
use thiserror::Error;

use crate::{OutputError, StoreError};

/// Errors that abort a run or describe a node failure cause.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cycle or unknown reference detected while building the graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A declared resource kind has no registered provider adapter.
    #[error("no provider registered for kind '{0}'")]
    UnknownKind(String),

    /// A provider adapter call failed; provider detail preserved.
    #[error("provider error on '{resource}': {source}")]
    Provider {
        resource: String,
        #[source]
        source: ProviderError,
    },

    /// A provider adapter call exceeded its timeout.
    #[error("provider call on '{resource}' timed out after {seconds}s")]
    Timeout { resource: String, seconds: u64 },

    /// The node was skipped because an ancestor failed.
    #[error("'{resource}' skipped: dependency '{failed}' failed")]
    DependencyFailed { resource: String, failed: String },

    /// The run was cancelled before this node was dispatched.
    #[error("run interrupted before '{0}' was dispatched")]
    Interrupted(String),

    /// The reconciliation store is unreadable or inconsistent.
    #[error("state corruption: {0}")]
    StateCorruption(String),

    /// Store I/O failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Declaration-level failure (reference resolution).
    #[error(transparent)]
    Decl(#[from] DeclError),

    /// Output cell misuse (double write).
    #[error(transparent)]
    Output(#[from] OutputError),
}
