//! Typed ID definitions for engine-generated identifiers.
//!
//! Each ID type has a unique prefix that identifies what it names.
//! IDs are ULID-based for sortability and uniqueness.

use crate::define_id;

define_id!(StackId, "stk");
define_id!(RunId, "run");
