use async_trait::async_trait;
use serde_json::json;

use super::responses::{NetworkConfig, NetworkStatus, NodeState, VersionInfo};
use super::ManagementResult;
use crate::domain::Membership;

/// Cluster log verbosity, raised around cluster-mutating operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "QM_LOG_DEBUG",
            LogLevel::Info => "QM_LOG_INFO",
        }
    }
}

/// Parameters of `create_object_backed_cluster`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateClusterRequest {
    pub cluster_name: String,
    pub admin_password: String,
    pub host_instance_id: String,
    pub product_type: String,
    pub object_storage_uris: Vec<String>,
    pub node_ips_and_fault_domains: Vec<String>,
    pub usable_capacity_clamp: u64,
}

/// Method of a raw REST call relayed through the admin CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMethod {
    Get,
    Put,
    Post,
}

impl RawMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawMethod::Get => "GET",
            RawMethod::Put => "PUT",
            RawMethod::Post => "POST",
        }
    }
}

/// Administrative interface of the storage cluster, addressed per node IP
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Fetch the admin CLI from `host` so later commands can run
    async fn install(&self, host: &str) -> ManagementResult<()>;

    async fn node_state(&self, host: &str) -> ManagementResult<NodeState>;

    async fn version(&self, host: &str) -> ManagementResult<VersionInfo>;

    async fn login(&self, host: &str, password: &str) -> ManagementResult<()>;

    async fn change_password(&self, host: &str, old: &str, new: &str) -> ManagementResult<()>;

    async fn create_cluster(&self, host: &str, request: &CreateClusterRequest) -> ManagementResult<()>;

    /// Set the full cluster membership in one batch
    async fn modify_membership(&self, host: &str, node_ips_and_fault_domains: &[String]) -> ManagementResult<()>;

    async fn add_object_storage_uris(&self, host: &str, uris: &[String]) -> ManagementResult<()>;

    async fn set_capacity_clamp(&self, host: &str, clamp: u64) -> ManagementResult<()>;

    async fn quorum_details(&self, host: &str) -> ManagementResult<Membership>;

    async fn network_config(&self, host: &str) -> ManagementResult<NetworkConfig>;

    async fn put_network_config(&self, host: &str, config: &NetworkConfig) -> ManagementResult<()>;

    async fn network_status(&self, host: &str) -> ManagementResult<NetworkStatus>;

    /// Point cluster monitoring at the given endpoints
    async fn set_monitoring(&self, host: &str, mq_host: &str, nexus_host: &str) -> ManagementResult<()>;

    /// Relay a REST call; returns the response body
    async fn raw(
        &self,
        host: &str,
        method: RawMethod,
        path: &str,
        body: Option<&str>,
    ) -> ManagementResult<String>;

    async fn set_log_level(&self, host: &str, level: LogLevel) -> ManagementResult<()> {
        let body = json!({"level": level.as_str(), "reset": false}).to_string();
        let path = format!("/v1/conf/log/module/{}", urlencoding::encode("/"));
        self.raw(host, RawMethod::Put, &path, Some(&body)).await?;
        Ok(())
    }

    async fn set_tunable(&self, host: &str, name: &str, value: u64) -> ManagementResult<()> {
        let body = json!({"configured_value": value.to_string()}).to_string();
        let path = format!("/v1/tunables/{}", urlencoding::encode(name));
        self.raw(host, RawMethod::Put, &path, Some(&body)).await?;
        Ok(())
    }

    /// Force the current quorum to end so tunables take effect
    async fn abandon_quorum_series(&self, host: &str) -> ManagementResult<()> {
        self.raw(host, RawMethod::Post, "/v1/debug/quorum/abandon-series", None)
            .await?;
        Ok(())
    }
}
