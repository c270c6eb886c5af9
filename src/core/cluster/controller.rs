//! Top-level provisioning sequence.
//!
//! validate host and credentials -> wait for nodes -> survey -> version gate
//! -> plan -> execute. Any failure is written to the status log as
//! `ERROR: <message>` before it is returned.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::executor::OperationExecutor;
use super::quorum_watcher::QuorumWatcher;
use super::reconciler::StateReconciler;
use crate::config::ProvisionerConfig;
use crate::core::logging::log_error_with_context;
use crate::domain::version;
use crate::error::{ProvisionError, Result};
use crate::infrastructure::cloud::CloudPlatform;
use crate::infrastructure::management::ManagementClient;
use crate::infrastructure::packages::PackageManager;
use crate::infrastructure::probe::EndpointProbe;
use crate::storage::deployment::keys;
use crate::storage::{DeploymentStore, StateStore, StatusLog};

pub struct ProvisioningController {
    config: Arc<ProvisionerConfig>,
    management: Arc<dyn ManagementClient>,
    cloud: Arc<dyn CloudPlatform>,
    probe: Arc<dyn EndpointProbe>,
    store: DeploymentStore,
    status: Arc<StatusLog>,
    watcher: Arc<QuorumWatcher>,
    reconciler: StateReconciler,
}

impl ProvisioningController {
    pub fn new(
        config: Arc<ProvisionerConfig>,
        state_store: Arc<dyn StateStore>,
        management: Arc<dyn ManagementClient>,
        cloud: Arc<dyn CloudPlatform>,
        probe: Arc<dyn EndpointProbe>,
    ) -> Self {
        let deployment = config.deployment_unique_name.clone();
        let store = DeploymentStore::new(Arc::clone(&state_store), deployment.clone());
        let status = Arc::new(StatusLog::new(state_store, deployment));
        let watcher = Arc::new(QuorumWatcher::new(
            Arc::clone(&management),
            config.polling.clone(),
        ));

        Self {
            config,
            management,
            cloud,
            probe,
            store,
            status,
            watcher,
            reconciler: StateReconciler::new(),
        }
    }

    /// Run provisioning once, recording the outcome in the status log
    pub async fn run(&self) -> Result<()> {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            deployment = %self.config.deployment_unique_name,
            cluster = %self.config.target.cluster_name,
            "🚀 Starting provisioning"
        );

        match self.provision().await {
            Ok(()) => {
                self.status.update("Shutting down provisioning instance").await?;
                info!(run_id = %run_id, "✅ Provisioning completed successfully");
                Ok(())
            }
            Err(e) => {
                log_error_with_context(&e, "provisioning", run_id);
                if let Err(status_err) = self.status.update(&format!("ERROR: {}", e)).await {
                    warn!("Could not record failure in status log: {}", status_err);
                }
                Err(e)
            }
        }
    }

    async fn provision(&self) -> Result<()> {
        let target = &self.config.target;
        target.validate()?;

        self.status.ensure_initialized().await?;
        self.validate_connectivity().await?;

        self.status
            .update("Installing required packages and reading secrets")
            .await?;
        self.install_required_packages().await?;
        let admin_password = self.setup_admin_password().await?;

        self.wait_for_nodes_ready().await?;

        self.status
            .update("Checking quorum state and boot status")
            .await?;
        let mut survey = self.watcher.survey(&target.node_ips).await;

        let running = survey
            .coordinator_version()
            .ok_or_else(|| {
                ProvisionError::StateInconsistency(format!(
                    "could not read software version from {}",
                    target.coordinator()
                ))
            })?
            .to_string();
        self.status
            .update(&format!(
                "Cluster software version {} running on all {} nodes.",
                running,
                target.node_ips.len()
            ))
            .await?;
        self.store.record_versions(&running).await?;

        let minimum = &self.config.endpoints.minimum_version;
        if !version::meets_minimum(&running, minimum) {
            return Err(ProvisionError::UnsupportedVersion {
                found: running,
                minimum: minimum.clone(),
            });
        }
        info!("Cluster software >= {}", minimum);

        if survey.is_unformed() {
            self.status
                .update("All nodes out of quorum, NEW CLUSTER")
                .await?;
        } else {
            self.management
                .login(target.coordinator(), &admin_password)
                .await?;
            let membership = self.watcher.parse_membership(target.coordinator()).await?;
            if membership.out_nodes.is_empty() {
                self.status
                    .update("Cluster in full quorum, checking for node add, node delete, and bucket additions")
                    .await?;
            }
            survey.membership = Some(membership);
        }

        let record = self.store.load_record().await?;
        let prior = match target.existing_deployment.as_deref() {
            Some(existing) if target.replace => {
                Some(self.store.for_deployment(existing).load_record().await?)
            }
            _ => None,
        };

        let plan = self
            .reconciler
            .plan(target, &record, prior.as_ref(), &survey)?;

        let executor = OperationExecutor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.management),
            Arc::clone(&self.cloud),
            Arc::clone(&self.watcher),
            self.store.clone(),
            Arc::clone(&self.status),
        );
        executor.execute(&plan, &admin_password).await
    }

    async fn validate_connectivity(&self) -> Result<()> {
        let endpoints = &self.config.endpoints;

        if self.probe.is_reachable(&endpoints.telemetry_url, false).await {
            self.status.update("BOOTED. Telemetry endpoint up.").await?;
        } else {
            self.status
                .update("BOOTED. Telemetry endpoint NOT reachable. Aborting deployment.")
                .await?;
            return Err(ProvisionError::Connectivity(format!(
                "telemetry endpoint {} not reachable",
                endpoints.telemetry_url
            )));
        }

        if self.probe.is_reachable(&endpoints.internet_url, false).await {
            self.status.update("BOOTED. Internet up.").await?;
        } else {
            warn!("Internet check {} failed", endpoints.internet_url);
            self.status
                .update("BOOTED. Internet NOT reachable. NAT or VPC endpoints are required.")
                .await?;
        }

        Ok(())
    }

    async fn install_required_packages(&self) -> Result<()> {
        if self.config.required_packages.is_empty() {
            return Ok(());
        }
        let manager = PackageManager::detect().await?;
        info!("Detected package manager {:?}", manager);
        manager
            .ensure_installed(&self.config.required_packages, Duration::from_secs(5))
            .await
    }

    /// Resolve the admin password; a replacement inherits the prior
    /// deployment's secret and copies it into this deployment's secret.
    async fn setup_admin_password(&self) -> Result<String> {
        let target = &self.config.target;

        let password = match target.existing_deployment.as_deref() {
            Some(existing) if target.replace => {
                let prior = self.store.for_deployment(existing);
                let secret_name = prior.get(keys::CLUSTER_SECRETS_NAME).await?.ok_or_else(|| {
                    ProvisionError::StateInconsistency(format!(
                        "deployment {} has no recorded cluster secret",
                        existing
                    ))
                })?;
                let password = self.cloud.access_secret(&secret_name).await?;
                self.cloud
                    .add_secret_version(&self.config.cluster_secrets_name, &password)
                    .await?;
                password
            }
            _ => {
                self.cloud
                    .access_secret(&self.config.cluster_secrets_name)
                    .await?
            }
        };

        self.store
            .put(keys::CLUSTER_SECRETS_NAME, &self.config.cluster_secrets_name)
            .await?;
        Ok(password)
    }

    /// Wait for every node's admin port, then fetch the admin CLI from the
    /// coordinator
    async fn wait_for_nodes_ready(&self) -> Result<()> {
        let target = &self.config.target;
        let port = self.config.endpoints.admin_port;

        self.status
            .update(&format!(
                "Waiting for node 1 to run cluster software. Package location: {}",
                self.config.package_url
            ))
            .await?;

        for (i, ip) in target.node_ips.iter().enumerate() {
            if i == 1 {
                self.status
                    .update("Cluster software running on node 1. Waiting for other nodes.")
                    .await?;
            }

            let url = format!("https://{}:{}/v1/node/state", ip, port);
            while !self.probe.is_reachable(&url, true).await {
                info!("⏳ Waiting for {} to boot", ip);
                tokio::time::sleep(self.config.polling.reachability_interval()).await;
            }

            if i == 0 {
                self.management.install(ip).await?;
            }
        }

        Ok(())
    }
}
