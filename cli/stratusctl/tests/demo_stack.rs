//! End-to-end check of the shipped demo stack against the simulated
//! providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use stratus_decl::load_manifest_str;
use stratus_engine::{Engine, EngineConfig, StateStore};
use stratus_provider::{Provider, SimCloud};
use tokio::sync::watch;

const DEMO_STACK: &str = include_str!("../../../demos/eks-cluster.toml");

#[tokio::test]
async fn test_demo_stack_converges() {
    let config = BTreeMap::from([(
        "cidr_allow_list".to_string(),
        "203.0.113.0/24".to_string(),
    )]);
    let decl = load_manifest_str(DEMO_STACK, &config).expect("demo stack must parse");
    assert_eq!(decl.stack, "eks-prod");

    let cloud = Arc::new(SimCloud::new());
    let store = Arc::new(StateStore::open_in_memory().unwrap());
    let engine = Engine::new(cloud.registry(), store, EngineConfig::default());

    let report = engine
        .up(&decl, watch::channel(false).1)
        .await
        .expect("demo stack must apply");

    assert!(report.succeeded(), "{:#?}", report.nodes);
    assert_eq!(cloud.len(), decl.len());

    // The CIDR from the config surface landed in the cluster.
    let provider = cloud.registry().get("cluster").unwrap();
    let found = provider.lookup("eks-cluster").await.unwrap().unwrap();
    let observed = provider.read(&found.provider_id).await.unwrap().unwrap();
    assert_eq!(
        observed.properties["public_access_cidrs"],
        serde_json::json!(["203.0.113.0/24"])
    );
    assert!(found.outputs.contains_key("oidc_provider_arn"));
}
