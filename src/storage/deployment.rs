//! Deployment-scoped view of the state store.
//!
//! Every persisted value lives in its own document whose id equals the field
//! name, inside a collection named after the deployment.

use std::sync::Arc;
use tracing::debug;

use crate::domain::ClusterRecord;
use crate::storage::encoding::{decode_list, decode_scalar, encode_list};
use crate::storage::{StateStore, StoreError, StoreResult};

/// Persisted field names
pub mod keys {
    pub const NODE_IPS: &str = "node-ips";
    pub const FAULT_DOMAIN_IDS: &str = "fault-domain-ids";
    pub const INSTANCE_IDS: &str = "instance-ids";
    pub const BUCKET_NAMES: &str = "bucket-names";
    pub const BUCKET_URIS: &str = "bucket-uris";
    pub const SOFT_CAPACITY_LIMIT: &str = "soft-capacity-limit";
    pub const INSTALLED_VERSION: &str = "installed-version";
    pub const CREATION_VERSION: &str = "creation-version";
    pub const CLUSTER_TYPE: &str = "cluster-type";
    pub const UUID: &str = "uuid";
    pub const FLOAT_IPS: &str = "float-ips";
    pub const FLOATING_IP_COUNT: &str = "floating-ip-count";
    pub const CREATION_NUMBER_AZS: &str = "creation-number-azs";
    pub const TUNABLES: &str = "tunables";
    pub const NEW_CLUSTER: &str = "new-cluster";
    pub const CLUSTER_SECRETS_NAME: &str = "cluster-secrets-name";
    pub const LAST_RUN_STATUS: &str = "last-run-status";
}

/// State store handle bound to one deployment
#[derive(Clone)]
pub struct DeploymentStore {
    store: Arc<dyn StateStore>,
    deployment: String,
}

impl DeploymentStore {
    pub fn new(store: Arc<dyn StateStore>, deployment: impl Into<String>) -> Self {
        Self {
            store,
            deployment: deployment.into(),
        }
    }

    /// Handle for another deployment sharing the same backend
    pub fn for_deployment(&self, deployment: impl Into<String>) -> Self {
        Self::new(Arc::clone(&self.store), deployment)
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Read a scalar; the `"null"` sentinel reads as `None`
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self.store.get_field(&self.deployment, key, key).await?;
        Ok(decode_scalar(value))
    }

    pub async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        debug!(deployment = %self.deployment, key, "Persisting field");
        self.store.put_field(&self.deployment, key, key, value).await
    }

    pub async fn get_list(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .get(key)
            .await?
            .map(|v| decode_list(&v))
            .unwrap_or_default())
    }

    pub async fn put_list<S: AsRef<str> + Sync>(&self, key: &str, items: &[S]) -> StoreResult<()> {
        self.put(key, &encode_list(items)).await
    }

    async fn get_u64(&self, key: &str) -> StoreResult<Option<u64>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| StoreError::InvalidValue {
                    field: key.to_string(),
                    value: raw,
                }),
        }
    }

    /// Load the persisted record; absent fields read as empty
    pub async fn load_record(&self) -> StoreResult<ClusterRecord> {
        Ok(ClusterRecord {
            node_ips: self.get_list(keys::NODE_IPS).await?,
            fault_domain_ids: self.get_list(keys::FAULT_DOMAIN_IDS).await?,
            instance_ids: self.get_list(keys::INSTANCE_IDS).await?,
            bucket_names: self.get_list(keys::BUCKET_NAMES).await?,
            bucket_uris: self.get_list(keys::BUCKET_URIS).await?,
            soft_capacity_limit: self.get_u64(keys::SOFT_CAPACITY_LIMIT).await?,
            installed_version: self.get(keys::INSTALLED_VERSION).await?,
            creation_version: self.get(keys::CREATION_VERSION).await?,
            cluster_type: self.get(keys::CLUSTER_TYPE).await?,
            uuid: self.get(keys::UUID).await?,
            float_ips: self.get_list(keys::FLOAT_IPS).await?,
        })
    }

    pub async fn put_node_lists<S: AsRef<str> + Sync>(
        &self,
        node_ips: &[S],
        fault_domain_ids: &[S],
        instance_ids: &[S],
    ) -> StoreResult<()> {
        self.put_list(keys::NODE_IPS, node_ips).await?;
        self.put_list(keys::FAULT_DOMAIN_IDS, fault_domain_ids).await?;
        self.put_list(keys::INSTANCE_IDS, instance_ids).await
    }

    pub async fn put_bucket_lists(&self, names: &[String], uris: &[String]) -> StoreResult<()> {
        self.put_list(keys::BUCKET_URIS, uris).await?;
        self.put_list(keys::BUCKET_NAMES, names).await
    }

    pub async fn put_capacity_limit(&self, limit: u64) -> StoreResult<()> {
        self.put(keys::SOFT_CAPACITY_LIMIT, &limit.to_string()).await
    }

    pub async fn put_floating_ips(&self, ips: &[String]) -> StoreResult<()> {
        self.put_list(keys::FLOAT_IPS, ips).await?;
        self.put(keys::FLOATING_IP_COUNT, &ips.len().to_string()).await
    }

    /// Record the version running now, and the creation version once
    pub async fn record_versions(&self, version: &str) -> StoreResult<()> {
        self.put(keys::INSTALLED_VERSION, version).await?;
        if self.get(keys::CREATION_VERSION).await?.is_none() {
            self.put(keys::CREATION_VERSION, version).await?;
        }
        Ok(())
    }
}
