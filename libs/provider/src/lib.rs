//! Provider adapter boundary.
//!
//! Each resource kind is provisioned through a uniform CRUD interface
//! against whatever system backs it (cloud API, cluster API, package
//! manager). The engine treats every call as opaque: a result or an
//! error.
//!
//! - `read` and `delete` must be safe to retry.
//! - `create` must be guarded against duplicate creation; providers
//!   expose a by-name `lookup` so the engine can adopt a resource
//!   whose create response was lost.
//!
//! Two in-process implementations ship with the engine: a
//! call-recording [`MockProvider`] for tests and a [`SimProvider`]
//! simulating a cloud account for local runs.

mod mock;
mod sim;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use mock::{CallKind, MockProvider, RecordedCall};
pub use sim::{SimCloud, SimProvider};

/// Resolved output values produced by provisioning one resource.
pub type Outputs = BTreeMap<String, serde_json::Value>;

/// Result of creating a resource.
#[derive(Debug, Clone)]
pub struct Created {
    /// Provider-side identifier for subsequent read/update/delete.
    pub provider_id: String,

    /// Outputs produced by the create.
    pub outputs: Outputs,
}

/// Provider-observed state of an existing resource.
#[derive(Debug, Clone)]
pub struct Observed {
    /// Properties as the provider currently reports them.
    pub properties: serde_json::Value,

    /// Current outputs.
    pub outputs: Outputs,
}

/// Errors from provider adapter calls.
///
/// Provider-specific detail is preserved in the message; the engine
/// never retries through this error, it fails the node.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backing system rejected or failed the call.
    #[error("provider call failed: {0}")]
    Call(String),

    /// An update/delete targeted a provider id that no longer exists.
    #[error("provider resource not found: {0}")]
    NotFound(String),
}

/// Uniform per-kind provisioning interface.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Create the resource, returning its provider id and outputs.
    async fn create(
        &self,
        name: &str,
        desired: &serde_json::Value,
    ) -> Result<Created, ProviderError>;

    /// Read current state; `None` means the resource does not exist.
    async fn read(&self, provider_id: &str) -> Result<Option<Observed>, ProviderError>;

    /// Apply desired properties to an existing resource.
    async fn update(
        &self,
        provider_id: &str,
        desired: &serde_json::Value,
    ) -> Result<Outputs, ProviderError>;

    /// Tear the resource down. Deleting an absent resource is not an
    /// error.
    async fn delete(&self, provider_id: &str) -> Result<(), ProviderError>;

    /// Find a resource by its declared name.
    ///
    /// Used before a fresh create to adopt a resource that exists at
    /// the provider but has no reconciliation record (a create whose
    /// response was lost).
    async fn lookup(&self, _name: &str) -> Result<Option<Created>, ProviderError> {
        Ok(None)
    }
}

/// Maps resource kinds to their adapters.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for a kind, replacing any previous one.
    pub fn register(&mut self, kind: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(kind.into(), provider);
    }

    /// Look up the adapter for a kind.
    pub fn get(&self, kind: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(kind).cloned()
    }

    /// Registered kinds, in order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|k| k.as_str())
    }
}

/// Resource kinds carried by the simulated provider set.
pub const SIM_KINDS: &[&str] = &[
    "iam-role",
    "iam-policy",
    "policy-attachment",
    "cluster",
    "node-group",
    "add-on",
    "helm-release",
    "namespace",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let mut registry = ProviderRegistry::new();
        registry.register("iam-role", Arc::new(MockProvider::new("iam-role")));

        assert!(registry.get("iam-role").is_some());
        assert!(registry.get("cluster").is_none());
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["iam-role"]);
    }
}
