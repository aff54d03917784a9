//! Declaration model for the stratus engine.
//!
//! A declaration is the desired-state input of a run: a set of typed
//! resource descriptions whose property values are either literals or
//! references to another resource's output (`${cluster.endpoint_url}`).
//! Key concepts:
//!
//! - **Resource declaration**: kind + properties + explicit ordering
//!   dependencies, identified by a stack-unique name.
//! - **Reference marker**: a `${name.output}` placeholder inside a
//!   property value; each marker becomes an implicit graph edge.
//! - **Spec hash**: deterministic digest of a declaration used to
//!   detect no-op re-applies.

mod error;
mod hash;
mod manifest;
mod reference;
mod types;

pub use error::DeclError;
pub use hash::SpecHash;
pub use manifest::load_manifest_str;
pub use reference::{collect_references, resolve_value, Reference};
pub use types::{Declaration, ResolveConflicts, ResourceDecl};
