//! Error types for declaration loading and validation.

use stratus_id::IdError;
use thiserror::Error;

/// Errors that can occur while building or loading a declaration.
#[derive(Debug, Error)]
pub enum DeclError {
    /// Two resources in the same stack share a name.
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),

    /// A `${config.*}` placeholder names a key the run was not given.
    #[error("resource '{resource}' references unknown config key '{key}'")]
    UnknownConfigKey { resource: String, key: String },

    /// A reference marker is syntactically invalid.
    #[error("invalid reference marker '{marker}': {reason}")]
    BadReference { marker: String, reason: String },

    /// The manifest is structurally invalid.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// TOML parse failure.
    #[error("manifest parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A resource name failed validation.
    #[error(transparent)]
    Name(#[from] IdError),
}
