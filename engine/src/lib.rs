//! # stratus-engine
//!
//! The provisioning engine: takes a declaration (a set of typed
//! resource descriptions connected by explicit ordering edges and data
//! references), builds the dependency graph, and drives every node to
//! `Ready` or `Failed` through provider adapters, with bounded
//! concurrency and durable reconciliation state.
//!
//! ## Architecture
//!
//! - **Output cells**: single-assignment slots holding resource
//!   outputs; the scheduler is the sole writer.
//! - **Planner**: diffs the declaration against reconciliation records
//!   to decide create/update/noop/delete per node.
//! - **Scheduler**: walks the graph in a deterministic topological
//!   order, dispatching eligible nodes concurrently and containing
//!   failures to their dependents.
//! - **State store**: SQLite record of last-applied state per node,
//!   enabling idempotent re-application and restart recovery.

mod config;
mod error;
mod outputs;
mod plan;
mod report;
mod scheduler;
mod store;

pub use config::EngineConfig;
pub use error::EngineError;
pub use outputs::{OutputCell, OutputError, OutputTable};
pub use plan::{Plan, PlanEntry, PlannedAction};
pub use report::{AppliedAction, FinalState, NodeReport, RunReport};
pub use scheduler::Engine;
pub use store::{ReconciliationRecord, StateStore, StoreError};
