#![allow(dead_code)]

// Test utilities and common setup
pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

use cluster_provisioner::config::ProvisionerConfig;
use cluster_provisioner::core::ProvisioningController;
use cluster_provisioner::storage::deployment::keys;
use cluster_provisioner::storage::{DeploymentStore, InMemoryStateStore, StateStore};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Collaborators for one provisioning run, shared with the test for inspection
pub struct TestEnvironment {
    pub config: ProvisionerConfig,
    pub store: Arc<InMemoryStateStore>,
    pub management: MockManagementClient,
    pub cloud: MockCloud,
    pub probe: MockProbe,
}

impl TestEnvironment {
    /// Environment whose nodes are booted but not yet clustered
    pub fn new(config: ProvisionerConfig) -> Self {
        let management = MockManagementClient::new();
        for (i, ip) in config.target.node_ips.iter().enumerate() {
            management.add_node(ip, &(i + 1).to_string(), VERSION);
        }

        Self {
            config,
            store: Arc::new(InMemoryStateStore::new()),
            management,
            cloud: MockCloud::new().with_secret(SECRET_NAME, ADMIN_PASSWORD),
            probe: MockProbe::new(),
        }
    }

    pub fn controller(&self) -> ProvisioningController {
        ProvisioningController::new(
            Arc::new(self.config.clone()),
            self.store.clone(),
            Arc::new(self.management.clone()),
            Arc::new(self.cloud.clone()),
            Arc::new(self.probe.clone()),
        )
    }

    pub fn deployment(&self) -> DeploymentStore {
        DeploymentStore::new(self.store.clone(), self.config.deployment_unique_name.clone())
    }

    /// A later run against the same store and cloud, with `formed` already
    /// clustered and every target node booted
    pub fn rerun(&self, formed: &[&str]) -> TestEnvironment {
        let management = MockManagementClient::new();
        for (i, ip) in self.config.target.node_ips.iter().enumerate() {
            management.add_node(ip, &(i + 1).to_string(), VERSION);
        }
        management.form_existing_cluster(formed, "cluster-uuid-1");

        TestEnvironment {
            config: self.config.clone(),
            store: self.store.clone(),
            management,
            cloud: self.cloud.clone(),
            probe: MockProbe::new(),
        }
    }

    /// Seed a persisted record as left behind by an earlier run
    pub async fn seed_record(&self, deployment: &str, node_count: usize) {
        let store = DeploymentStore::new(self.store.clone(), deployment);
        let target = TestFixtures::target(node_count);
        store
            .put_node_lists(&target.node_ips, &target.fault_domain_ids, &target.instance_ids)
            .await
            .unwrap();
        store
            .put_bucket_lists(&target.bucket_names, &target.bucket_uris)
            .await
            .unwrap();
        store.put_capacity_limit(TIB).await.unwrap();
        store.put(keys::INSTALLED_VERSION, VERSION).await.unwrap();
        store.put(keys::CLUSTER_TYPE, "CNQ=Hot, GCS=Standard").await.unwrap();
    }

    /// Messages of the status log, in write order
    pub async fn status_messages(&self) -> Vec<String> {
        let fields: BTreeMap<String, String> = self
            .store
            .fields(&self.config.deployment_unique_name, keys::LAST_RUN_STATUS)
            .await;
        let mut entries: Vec<(String, String)> = fields
            .into_iter()
            .filter(|(label, _)| label != keys::LAST_RUN_STATUS)
            .collect();
        // labels sort chronologically within a run
        entries.sort_by(|a, b| label_order(&a.0).cmp(&label_order(&b.0)));
        entries.into_iter().map(|(_, message)| message).collect()
    }

    pub async fn field(&self, key: &str) -> Option<String> {
        self.store
            .get_field(&self.config.deployment_unique_name, key, key)
            .await
            .unwrap()
    }
}

/// `Mon_DD_HHMMSS[_n]` -> sortable key
fn label_order(label: &str) -> (String, u32) {
    let mut parts = label.rsplitn(2, '_');
    let last = parts.next().unwrap_or_default();
    match (last.parse::<u32>(), parts.next()) {
        (Ok(n), Some(base)) if last.len() < 6 => (base.to_string(), n),
        _ => (label.to_string(), 0),
    }
}
