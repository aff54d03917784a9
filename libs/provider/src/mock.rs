//! Call-recording mock provider for engine tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::{Created, Observed, Outputs, Provider, ProviderError};

/// The kind of adapter call that was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Create,
    Read,
    Update,
    Delete,
    Lookup,
}

/// One recorded adapter call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    /// Resource name for create/lookup, provider id otherwise.
    pub target: String,
}

struct Entry {
    name: String,
    properties: serde_json::Value,
    outputs: Outputs,
}

/// Mock provider for tests.
///
/// Records every call, serves reads from an in-memory table, and can
/// be told to fail specific resources.
pub struct MockProvider {
    kind: String,
    counter: AtomicU64,
    calls: Mutex<Vec<RecordedCall>>,
    fail_create: Mutex<BTreeSet<String>>,
    fail_delete: Mutex<BTreeSet<String>>,
    canned_outputs: Mutex<BTreeMap<String, Outputs>>,
    resources: Mutex<BTreeMap<String, Entry>>,
}

impl MockProvider {
    /// Create a mock provider for a kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            counter: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
            fail_create: Mutex::new(BTreeSet::new()),
            fail_delete: Mutex::new(BTreeSet::new()),
            canned_outputs: Mutex::new(BTreeMap::new()),
            resources: Mutex::new(BTreeMap::new()),
        }
    }

    /// Fail `create` for the named resource.
    pub fn fail_create_of(&self, name: &str) {
        self.fail_create.lock().unwrap().insert(name.to_string());
    }

    /// Fail `delete` for the named resource.
    pub fn fail_delete_of(&self, name: &str) {
        self.fail_delete.lock().unwrap().insert(name.to_string());
    }

    /// Overwrite the stored properties of the named resource, as if it
    /// had been changed out of band.
    pub fn drift(&self, name: &str, properties: serde_json::Value) {
        let mut resources = self.resources.lock().unwrap();
        if let Some(entry) = resources.values_mut().find(|e| e.name == name) {
            entry.properties = properties;
        }
    }

    /// Serve fixed outputs when the named resource is created.
    pub fn set_outputs(&self, name: &str, outputs: Outputs) {
        self.canned_outputs
            .lock()
            .unwrap()
            .insert(name.to_string(), outputs);
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Count of create/update/delete calls (reads and lookups are
    /// side-effect free and excluded).
    pub fn mutation_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                matches!(
                    c.kind,
                    CallKind::Create | CallKind::Update | CallKind::Delete
                )
            })
            .count()
    }

    /// Count of create calls for one resource name.
    pub fn create_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind == CallKind::Create && c.target == name)
            .count()
    }

    fn record(&self, kind: CallKind, target: &str) {
        self.calls.lock().unwrap().push(RecordedCall {
            kind,
            target: target.to_string(),
        });
    }

    fn default_outputs(&self, name: &str, provider_id: &str) -> Outputs {
        Outputs::from([
            (
                "arn".to_string(),
                serde_json::json!(format!("arn:mock:{}:{}", self.kind, name)),
            ),
            ("id".to_string(), serde_json::json!(provider_id)),
        ])
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn create(
        &self,
        name: &str,
        desired: &serde_json::Value,
    ) -> Result<Created, ProviderError> {
        self.record(CallKind::Create, name);

        if self.fail_create.lock().unwrap().contains(name) {
            return Err(ProviderError::Call(format!(
                "mock configured to fail create of '{name}'"
            )));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let provider_id = format!("mock-{}-{:04}", self.kind, n);

        let outputs = self
            .canned_outputs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_outputs(name, &provider_id));

        debug!(kind = %self.kind, name, provider_id = %provider_id, "[MOCK] created");

        self.resources.lock().unwrap().insert(
            provider_id.clone(),
            Entry {
                name: name.to_string(),
                properties: desired.clone(),
                outputs: outputs.clone(),
            },
        );

        Ok(Created {
            provider_id,
            outputs,
        })
    }

    async fn read(&self, provider_id: &str) -> Result<Option<Observed>, ProviderError> {
        self.record(CallKind::Read, provider_id);
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(provider_id)
            .map(|e| Observed {
                properties: e.properties.clone(),
                outputs: e.outputs.clone(),
            }))
    }

    async fn update(
        &self,
        provider_id: &str,
        desired: &serde_json::Value,
    ) -> Result<Outputs, ProviderError> {
        self.record(CallKind::Update, provider_id);
        let mut resources = self.resources.lock().unwrap();
        let Some(entry) = resources.get_mut(provider_id) else {
            return Err(ProviderError::NotFound(provider_id.to_string()));
        };
        entry.properties = desired.clone();
        Ok(entry.outputs.clone())
    }

    async fn delete(&self, provider_id: &str) -> Result<(), ProviderError> {
        self.record(CallKind::Delete, provider_id);
        let mut resources = self.resources.lock().unwrap();
        if let Some(entry) = resources.get(provider_id) {
            if self.fail_delete.lock().unwrap().contains(&entry.name) {
                return Err(ProviderError::Call(format!(
                    "mock configured to fail delete of '{}'",
                    entry.name
                )));
            }
        }
        resources.remove(provider_id);
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<Option<Created>, ProviderError> {
        self.record(CallKind::Lookup, name);
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, e)| Created {
                provider_id: id.clone(),
                outputs: e.outputs.clone(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_read_update_delete() {
        let mock = MockProvider::new("iam-role");
        let desired = serde_json::json!({"policy": "x"});

        let created = mock.create("roleA", &desired).await.unwrap();
        assert!(created.outputs.contains_key("arn"));

        let observed = mock.read(&created.provider_id).await.unwrap().unwrap();
        assert_eq!(observed.properties, desired);

        let changed = serde_json::json!({"policy": "y"});
        mock.update(&created.provider_id, &changed).await.unwrap();
        let observed = mock.read(&created.provider_id).await.unwrap().unwrap();
        assert_eq!(observed.properties, changed);

        mock.delete(&created.provider_id).await.unwrap();
        assert!(mock.read(&created.provider_id).await.unwrap().is_none());

        assert_eq!(mock.mutation_count(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mock = MockProvider::new("cluster");
        mock.fail_create_of("clusterB");

        let err = mock
            .create("clusterB", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Call(_)));
        assert_eq!(mock.create_count("clusterB"), 1);
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let mock = MockProvider::new("iam-role");
        let created = mock.create("roleA", &serde_json::json!({})).await.unwrap();

        let found = mock.lookup("roleA").await.unwrap().unwrap();
        assert_eq!(found.provider_id, created.provider_id);
        assert!(mock.lookup("ghost").await.unwrap().is_none());
    }
}
