use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use super::{CloudError, CloudPlatform, CloudResult};
use crate::infrastructure::process::{self, ProcessError};

#[derive(Debug, Clone)]
pub struct GcloudConfig {
    pub binary: PathBuf,
    pub project: String,
    pub timeout: Duration,
}

/// [`CloudPlatform`] backed by the `gcloud` CLI
pub struct GcloudCli {
    config: GcloudConfig,
}

impl GcloudCli {
    pub fn new(config: GcloudConfig) -> Self {
        Self { config }
    }

    fn project_flag(&self) -> String {
        format!("--project={}", self.config.project)
    }

    async fn run(&self, operation: &str, args: Vec<String>, stdin: Option<&str>) -> CloudResult<String> {
        debug!(operation, "gcloud");
        let output = process::run(&self.config.binary, &args, stdin, self.config.timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Spawn { source, .. } => CloudError::Invoke(source),
                ProcessError::Timeout { .. } => CloudError::Timeout {
                    operation: operation.to_string(),
                },
            })?;

        if output.success() {
            Ok(output.stdout)
        } else {
            Err(CloudError::CommandFailed {
                operation: operation.to_string(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

#[async_trait]
impl CloudPlatform for GcloudCli {
    async fn access_secret(&self, name: &str) -> CloudResult<String> {
        let mut argv = args(&["secrets", "versions", "access", "latest"]);
        argv.push(self.project_flag());
        argv.push(format!("--secret={}", name));
        let value = self.run("secrets versions access", argv, None).await?;
        Ok(value.trim_end_matches(&['\r', '\n'][..]).to_string())
    }

    async fn add_secret_version(&self, name: &str, value: &str) -> CloudResult<()> {
        let mut argv = args(&["secrets", "versions", "add", name]);
        argv.push(self.project_flag());
        argv.push("--data-file=-".to_string());
        self.run("secrets versions add", argv, Some(value)).await?;
        Ok(())
    }

    async fn bucket_is_empty(&self, bucket: &str) -> CloudResult<bool> {
        let mut argv = args(&["storage", "objects", "list"]);
        argv.push(format!("gs://{}", bucket));
        argv.push(self.project_flag());
        argv.push("--limit=1".to_string());
        let listing = self.run("storage objects list", argv, None).await?;
        Ok(listing.trim().is_empty())
    }

    async fn allow_cross_deployment_traffic(&self, existing: &str, current: &str) -> CloudResult<()> {
        let tags = format!("{}-cluster,{}-cluster", existing, current);
        let rule = format!("{}-qumulo-internal", existing);
        info!("🔓 Widening firewall rule {} to {}", rule, tags);

        let mut argv = args(&["compute", "firewall-rules", "update", &rule]);
        argv.push(self.project_flag());
        argv.push(format!("--source-tags={}", tags));
        argv.push(format!("--target-tags={}", tags));
        self.run("compute firewall-rules update", argv, None).await?;
        Ok(())
    }

    async fn instance_zone(&self, instance_id: &str) -> CloudResult<String> {
        let mut argv = args(&["compute", "instances", "list"]);
        argv.push(self.project_flag());
        argv.push(format!("--filter=id=( {} )", instance_id));
        argv.push("--format=value(zone)".to_string());
        let zone = self.run("compute instances list", argv, None).await?;
        let zone = zone.trim();
        if zone.is_empty() {
            return Err(CloudError::NotFound(format!("no zone for instance {}", instance_id)));
        }
        Ok(zone.to_string())
    }

    async fn set_instance_label(
        &self,
        instance_name: &str,
        zone: &str,
        key: &str,
        value: &str,
    ) -> CloudResult<()> {
        let mut argv = args(&["compute", "instances", "update", instance_name]);
        argv.push(self.project_flag());
        argv.push(format!("--zone={}", zone));
        argv.push(format!("--update-labels={}={}", key, value));
        self.run("compute instances update", argv, None).await?;
        Ok(())
    }
}
