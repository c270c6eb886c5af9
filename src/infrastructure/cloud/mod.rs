//! Cloud control plane: secrets, buckets, firewall rules and instance labels

pub mod gcloud;

pub use gcloud::{GcloudCli, GcloudConfig};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("failed to invoke cloud CLI: {0}")]
    Invoke(#[from] std::io::Error),

    #[error("cloud CLI `{operation}` timed out")]
    Timeout { operation: String },

    #[error("cloud CLI `{operation}` failed: {stderr}")]
    CommandFailed { operation: String, stderr: String },

    #[error("{0}")]
    NotFound(String),
}

pub type CloudResult<T> = Result<T, CloudError>;

#[async_trait]
pub trait CloudPlatform: Send + Sync {
    /// Latest version of a secret
    async fn access_secret(&self, name: &str) -> CloudResult<String>;

    /// Store `value` as a new version of a secret
    async fn add_secret_version(&self, name: &str, value: &str) -> CloudResult<()>;

    async fn bucket_is_empty(&self, bucket: &str) -> CloudResult<bool>;

    /// Let nodes of two deployments reach each other through the prior
    /// deployment's internal firewall rule
    async fn allow_cross_deployment_traffic(&self, existing: &str, current: &str) -> CloudResult<()>;

    async fn instance_zone(&self, instance_id: &str) -> CloudResult<String>;

    async fn set_instance_label(
        &self,
        instance_name: &str,
        zone: &str,
        key: &str,
        value: &str,
    ) -> CloudResult<()>;
}
