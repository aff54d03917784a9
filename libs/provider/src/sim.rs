//! Simulated cloud account.
//!
//! Stands in for the real AWS/Kubernetes/Helm backends during local
//! runs: one shared [`SimCloud`] account, one [`SimProvider`] adapter
//! per kind. Outputs are deterministic functions of (kind, name) so
//! repeated runs produce identical values, and the account keeps a
//! by-name index so `create` is naturally idempotent.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{Created, Observed, Outputs, Provider, ProviderError, SIM_KINDS};

const SIM_REGION: &str = "us-east-1";
const SIM_ACCOUNT: &str = "123456789012";

struct SimResource {
    kind: String,
    name: String,
    properties: serde_json::Value,
    outputs: Outputs,
}

/// The shared in-memory account behind every [`SimProvider`].
#[derive(Default)]
pub struct SimCloud {
    resources: Mutex<BTreeMap<String, SimResource>>,
}

impl SimCloud {
    /// Create an empty simulated account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with one adapter per simulated kind.
    pub fn registry(self: &Arc<Self>) -> crate::ProviderRegistry {
        let mut registry = crate::ProviderRegistry::new();
        for kind in SIM_KINDS {
            registry.register(
                *kind,
                Arc::new(SimProvider {
                    kind: (*kind).to_string(),
                    cloud: Arc::clone(self),
                }) as Arc<dyn Provider>,
            );
        }
        registry
    }

    /// Number of live resources (test helper).
    pub fn len(&self) -> usize {
        self.resources.lock().unwrap().len()
    }

    /// True when the account holds no resources.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-kind adapter over a [`SimCloud`] account.
pub struct SimProvider {
    kind: String,
    cloud: Arc<SimCloud>,
}

impl SimProvider {
    fn provider_id(&self, name: &str) -> String {
        format!("sim/{}/{}", self.kind, name)
    }

    /// Deterministic 8-hex-char suffix derived from (kind, name).
    fn suffix(&self, name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_bytes());
        hasher.update(b"/");
        hasher.update(name.as_bytes());
        hex::encode(&hasher.finalize()[..4])
    }

    fn outputs_for(&self, name: &str, desired: &serde_json::Value) -> Outputs {
        let suffix = self.suffix(name);
        let mut outputs = Outputs::new();
        outputs.insert("name".to_string(), serde_json::json!(name));

        match self.kind.as_str() {
            "iam-role" => {
                outputs.insert(
                    "arn".to_string(),
                    serde_json::json!(format!("arn:aws:iam::{SIM_ACCOUNT}:role/{name}-{suffix}")),
                );
            }
            "iam-policy" => {
                outputs.insert(
                    "arn".to_string(),
                    serde_json::json!(format!(
                        "arn:aws:iam::{SIM_ACCOUNT}:policy/{name}-{suffix}"
                    )),
                );
            }
            "policy-attachment" => {
                outputs.insert(
                    "id".to_string(),
                    serde_json::json!(format!("attach-{suffix}")),
                );
            }
            "cluster" => {
                let oidc_host = format!("oidc.eks.{SIM_REGION}.sim/{suffix}");
                let endpoint = format!("https://{suffix}.eks.{SIM_REGION}.sim");
                outputs.insert(
                    "arn".to_string(),
                    serde_json::json!(format!(
                        "arn:aws:eks:{SIM_REGION}:{SIM_ACCOUNT}:cluster/{name}"
                    )),
                );
                outputs.insert("endpoint_url".to_string(), serde_json::json!(endpoint));
                outputs.insert(
                    "oidc_provider_arn".to_string(),
                    serde_json::json!(format!(
                        "arn:aws:iam::{SIM_ACCOUNT}:oidc-provider/{oidc_host}"
                    )),
                );
                outputs.insert(
                    "oidc_provider_url".to_string(),
                    serde_json::json!(oidc_host),
                );
                outputs.insert(
                    "kubeconfig".to_string(),
                    serde_json::json!({
                        "cluster": name,
                        "server": endpoint,
                        "certificate-authority-data": suffix,
                    }),
                );
            }
            "node-group" => {
                outputs.insert(
                    "arn".to_string(),
                    serde_json::json!(format!(
                        "arn:aws:eks:{SIM_REGION}:{SIM_ACCOUNT}:nodegroup/{name}/{suffix}"
                    )),
                );
                outputs.insert("status".to_string(), serde_json::json!("ACTIVE"));
            }
            "add-on" => {
                if let Some(version) = desired.get("addon_version") {
                    outputs.insert("version".to_string(), version.clone());
                }
                outputs.insert("status".to_string(), serde_json::json!("ACTIVE"));
            }
            "helm-release" => {
                outputs.insert("revision".to_string(), serde_json::json!(1));
                outputs.insert("status".to_string(), serde_json::json!("deployed"));
                if let Some(ns) = desired.get("namespace") {
                    outputs.insert("namespace".to_string(), ns.clone());
                }
            }
            "namespace" => {}
            other => {
                outputs.insert(
                    "id".to_string(),
                    serde_json::json!(format!("{other}-{suffix}")),
                );
            }
        }

        outputs
    }
}

#[async_trait]
impl Provider for SimProvider {
    async fn create(
        &self,
        name: &str,
        desired: &serde_json::Value,
    ) -> Result<Created, ProviderError> {
        // Simulate a network-bound call.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let provider_id = self.provider_id(name);
        let outputs = self.outputs_for(name, desired);

        let mut resources = self.cloud.resources.lock().unwrap();
        if let Some(existing) = resources.get(&provider_id) {
            // By-name idempotence: an identically named resource is
            // adopted rather than duplicated.
            info!(kind = %self.kind, name, "[SIM] create found existing resource, adopting");
            return Ok(Created {
                provider_id,
                outputs: existing.outputs.clone(),
            });
        }

        info!(kind = %self.kind, name, provider_id = %provider_id, "[SIM] created");
        resources.insert(
            provider_id.clone(),
            SimResource {
                kind: self.kind.clone(),
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
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(self
            .cloud
            .resources
            .lock()
            .unwrap()
            .get(provider_id)
            .map(|r| Observed {
                properties: r.properties.clone(),
                outputs: r.outputs.clone(),
            }))
    }

    async fn update(
        &self,
        provider_id: &str,
        desired: &serde_json::Value,
    ) -> Result<Outputs, ProviderError> {
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut resources = self.cloud.resources.lock().unwrap();
        let Some(resource) = resources.get_mut(provider_id) else {
            return Err(ProviderError::NotFound(provider_id.to_string()));
        };

        let outputs = self.outputs_for(&resource.name, desired);
        resource.properties = desired.clone();
        resource.outputs = outputs.clone();
        info!(kind = %self.kind, provider_id, "[SIM] updated");
        Ok(outputs)
    }

    async fn delete(&self, provider_id: &str) -> Result<(), ProviderError> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        let removed = self
            .cloud
            .resources
            .lock()
            .unwrap()
            .remove(provider_id)
            .is_some();
        debug!(kind = %self.kind, provider_id, removed, "[SIM] delete");
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<Option<Created>, ProviderError> {
        Ok(self
            .cloud
            .resources
            .lock()
            .unwrap()
            .iter()
            .find(|(_, r)| r.kind == self.kind && r.name == name)
            .map(|(id, r)| Created {
                provider_id: id.clone(),
                outputs: r.outputs.clone(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_provider(cloud: &Arc<SimCloud>) -> SimProvider {
        SimProvider {
            kind: "cluster".to_string(),
            cloud: Arc::clone(cloud),
        }
    }

    #[tokio::test]
    async fn test_cluster_outputs() {
        let cloud = Arc::new(SimCloud::new());
        let provider = cluster_provider(&cloud);

        let created = provider
            .create("eks-cluster", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(created.outputs.contains_key("endpoint_url"));
        assert!(created.outputs.contains_key("oidc_provider_arn"));
        assert!(created.outputs.contains_key("oidc_provider_url"));
        assert!(created.outputs.contains_key("kubeconfig"));
    }

    #[tokio::test]
    async fn test_create_is_idempotent_by_name() {
        let cloud = Arc::new(SimCloud::new());
        let provider = cluster_provider(&cloud);

        let a = provider
            .create("eks-cluster", &serde_json::json!({}))
            .await
            .unwrap();
        let b = provider
            .create("eks-cluster", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(a.provider_id, b.provider_id);
        assert_eq!(cloud.len(), 1);
    }

    #[tokio::test]
    async fn test_outputs_deterministic_across_accounts() {
        let a = {
            let cloud = Arc::new(SimCloud::new());
            cluster_provider(&cloud)
                .create("c", &serde_json::json!({}))
                .await
                .unwrap()
        };
        let b = {
            let cloud = Arc::new(SimCloud::new());
            cluster_provider(&cloud)
                .create("c", &serde_json::json!({}))
                .await
                .unwrap()
        };
        assert_eq!(a.outputs, b.outputs);
    }

    #[tokio::test]
    async fn test_registry_covers_all_kinds() {
        let cloud = Arc::new(SimCloud::new());
        let registry = cloud.registry();
        for kind in SIM_KINDS {
            assert!(registry.get(kind).is_some(), "missing kind {kind}");
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let cloud = Arc::new(SimCloud::new());
        let provider = cluster_provider(&cloud);
        let created = provider.create("c", &serde_json::json!({})).await.unwrap();

        provider.delete(&created.provider_id).await.unwrap();
        provider.delete(&created.provider_id).await.unwrap();
        assert!(cloud.is_empty());
    }
}
