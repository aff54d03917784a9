//! # stratus-id
//!
//! Stable ID types, parsing, and validation for the stratus engine.
//!
//! Two families of identifiers live here:
//!
//! - System-generated ids with a `{prefix}_{ulid}` format (`StackId`,
//!   `RunId`). Sortable, unique, strictly parsed.
//! - [`ResourceName`]: the user-chosen logical name of a declared
//!   resource, unique within a stack. Names come from declarations, so
//!   they are validated rather than generated.

mod error;
mod macros;
mod name;
mod types;

pub use error::IdError;
pub use name::ResourceName;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
