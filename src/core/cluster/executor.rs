//! Carries out an [`OperationPlan`] against the cluster.
//!
//! Operations run in a fixed order and every one of them persists its outcome
//! as soon as the cluster confirms it, so an interrupted run can be repeated.
//! A failed command aborts the run; nothing is rolled back.

use std::sync::Arc;
use tracing::{info, warn};

use super::quorum_watcher::QuorumWatcher;
use super::reconciler::OperationPlan;
use crate::config::ProvisionerConfig;
use crate::error::{ProvisionError, Result};
use crate::infrastructure::cloud::CloudPlatform;
use crate::infrastructure::management::{
    CreateClusterRequest, LogLevel, ManagementClient, NetworkConfig,
};
use crate::storage::deployment::keys;
use crate::storage::{DeploymentStore, StatusLog};

const IOPS_TUNABLE: &str = "credit_accountant_io_refill_iops";
const BLOCKS_TUNABLE: &str = "credit_accountant_th_refill_blocks_per_second";

pub struct OperationExecutor {
    config: Arc<ProvisionerConfig>,
    management: Arc<dyn ManagementClient>,
    cloud: Arc<dyn CloudPlatform>,
    watcher: Arc<QuorumWatcher>,
    store: DeploymentStore,
    status: Arc<StatusLog>,
}

impl OperationExecutor {
    pub fn new(
        config: Arc<ProvisionerConfig>,
        management: Arc<dyn ManagementClient>,
        cloud: Arc<dyn CloudPlatform>,
        watcher: Arc<QuorumWatcher>,
        store: DeploymentStore,
        status: Arc<StatusLog>,
    ) -> Self {
        Self {
            config,
            management,
            cloud,
            watcher,
            store,
            status,
        }
    }

    fn coordinator(&self) -> &str {
        self.config.target.coordinator()
    }

    pub async fn execute(&self, plan: &OperationPlan, admin_password: &str) -> Result<()> {
        if plan.replace_cluster {
            info!("EXECUTING: Cluster replacement");
            self.replace_cluster(admin_password).await?;
        } else if plan.new_cluster {
            info!("EXECUTING: New cluster creation");
            self.create_cluster(admin_password).await?;
        } else {
            self.management
                .login(self.coordinator(), admin_password)
                .await?;

            if plan.add_nodes {
                info!("EXECUTING: Add nodes operation");
                self.add_nodes(plan).await?;
            }
            if plan.remove_nodes {
                info!("EXECUTING: Remove nodes operation");
                self.remove_nodes(plan).await?;
            }
            self.reconcile_floating_ips().await?;
        }

        if plan.increase_limit {
            info!("EXECUTING: Capacity limit increase");
            self.update_capacity().await?;
        }
        if plan.add_buckets {
            info!("EXECUTING: Add storage buckets");
            self.add_buckets(plan).await?;
        }

        self.refresh_instance_labels().await;
        Ok(())
    }

    /// Refuse to proceed if any bucket already holds objects
    async fn verify_buckets_empty(&self, bucket_names: &[String]) -> Result<()> {
        for bucket in bucket_names {
            if !self.cloud.bucket_is_empty(bucket).await? {
                warn!("**BUCKET NOT EMPTY, Exiting. Empty bucket(s) and restart provisioner.");
                return Err(ProvisionError::BucketNotEmpty(bucket.clone()));
            }
            info!("**BUCKET {} EMPTY", bucket);
        }
        Ok(())
    }

    async fn cluster_id(&self, host: &str) -> Result<String> {
        let state = self.management.node_state(host).await?;
        state.cluster_id.ok_or_else(|| {
            ProvisionError::StateInconsistency(format!("node {} did not report a cluster id", host))
        })
    }

    /// Persist the full record of a freshly formed node set
    async fn persist_cluster_record(&self, uuid: &str, cluster_type: &str) -> Result<()> {
        let target = &self.config.target;
        self.store.put(keys::UUID, uuid).await?;
        self.store
            .put_node_lists(&target.node_ips, &target.fault_domain_ids, &target.instance_ids)
            .await?;
        self.store
            .put(keys::CREATION_NUMBER_AZS, &target.number_azs.to_string())
            .await?;
        self.store.put(keys::CLUSTER_TYPE, cluster_type).await?;
        self.store.put_capacity_limit(target.capacity_limit).await?;
        self.store
            .put_bucket_lists(&target.bucket_names, &target.bucket_uris)
            .await?;
        Ok(())
    }

    async fn create_cluster(&self, admin_password: &str) -> Result<()> {
        let target = &self.config.target;
        let host = self.coordinator();

        self.verify_buckets_empty(&target.bucket_names).await?;

        self.status
            .update(&format!(
                "Forming first quorum and configuring cluster with {} nodes",
                target.node_ips.len()
            ))
            .await?;

        self.management.set_log_level(host, LogLevel::Debug).await?;

        let request = CreateClusterRequest {
            cluster_name: target.cluster_name.clone(),
            admin_password: self.config.default_admin_password.clone(),
            host_instance_id: self.config.host_instance_id.clone(),
            product_type: target.storage_class.product_type().to_string(),
            object_storage_uris: target.bucket_uris.clone(),
            node_ips_and_fault_domains: target.node_fault_domain_pairs(),
            usable_capacity_clamp: target.capacity_limit,
        };
        info!(
            cluster_name = %request.cluster_name,
            product_type = %request.product_type,
            clamp = request.usable_capacity_clamp,
            "Quorum formation parameters: {:?} {:?}",
            request.node_ips_and_fault_domains,
            request.object_storage_uris
        );
        self.management.create_cluster(host, &request).await?;
        self.watcher.wait_for_quorum(host).await?;

        let uuid = self.cluster_id(host).await?;
        self.persist_cluster_record(&uuid, &target.storage_class.classification())
            .await?;
        self.store.put(keys::NEW_CLUSTER, "false").await?;

        self.status
            .update("Setting cluster tunables if necessary")
            .await?;
        self.management
            .login(host, &self.config.default_admin_password)
            .await?;
        self.apply_tunables(host).await?;

        if self.config.dev_environment {
            let endpoints = &self.config.endpoints;
            self.management
                .set_monitoring(host, &endpoints.staging_mq_host, &endpoints.staging_nexus_host)
                .await?;
        }

        self.apply_initial_floating_ips(host).await?;

        self.management
            .change_password(host, &self.config.default_admin_password, admin_password)
            .await?;
        Ok(())
    }

    async fn replace_cluster(&self, admin_password: &str) -> Result<()> {
        let target = &self.config.target;
        let existing = target.existing_deployment.as_deref().ok_or_else(|| {
            ProvisionError::Config("replacement requires existing_deployment".into())
        })?;
        let prior_store = self.store.for_deployment(existing);
        let prior = prior_store.load_record().await?;
        if prior.node_ips.is_empty() || prior.instance_ids.is_empty() {
            return Err(ProvisionError::StateInconsistency(
                "Cannot find existing cluster information for replacement".into(),
            ));
        }
        let old_coordinator = prior.node_ips[0].as_str();

        self.status
            .update("Detected CLUSTER REPLACE. Updating firewall rule for internode communication and detecting node IDs.")
            .await?;
        self.cloud
            .allow_cross_deployment_traffic(existing, self.store.deployment())
            .await?;
        let old_ids = self.watcher.node_ids(&prior.node_ips).await?;

        self.status
            .update("Detected CLUSTER REPLACE. Adding new nodes to quorum and removing existing nodes from quorum.")
            .await?;
        self.management.login(old_coordinator, admin_password).await?;
        self.management
            .set_log_level(old_coordinator, LogLevel::Debug)
            .await?;
        self.management
            .modify_membership(old_coordinator, &target.node_fault_domain_pairs())
            .await?;

        self.status
            .update("Detected CLUSTER REPLACE. Waiting for new quorum.")
            .await?;
        let host = self.coordinator();
        self.watcher.wait_for_quorum(host).await?;

        self.status
            .update("Detected CLUSTER REPLACE. New quorum formed, validating node replacement.")
            .await?;
        let membership = self
            .watcher
            .wait_for_membership(host, target.node_ips.len())
            .await?;
        if let Some(stale) = membership.retained(&old_ids).first() {
            return Err(ProvisionError::StateInconsistency(format!(
                "Old node {} not removed from quorum",
                stale
            )));
        }

        self.status
            .update(&format!(
                "Detected CLUSTER REPLACE: New quorum formed with {} new nodes as requested.",
                target.node_ips.len()
            ))
            .await?;

        let uuid = self.cluster_id(host).await?;
        let cluster_type = prior
            .cluster_type
            .clone()
            .unwrap_or_else(|| target.storage_class.classification());
        self.persist_cluster_record(&uuid, &cluster_type).await?;

        self.management.login(host, admin_password).await?;
        self.reconcile_floating_ips().await?;
        self.store.put(keys::NEW_CLUSTER, "false").await?;

        self.status
            .update("Setting cluster tunables if necessary")
            .await?;
        self.apply_tunables(host).await
    }

    async fn add_nodes(&self, plan: &OperationPlan) -> Result<()> {
        let target = &self.config.target;
        let host = self.coordinator();
        let first_added = plan.added_ips.first().ok_or_else(|| {
            ProvisionError::StateInconsistency("no nodes to add".into())
        })?;

        self.status
            .update(&format!(
                "Quorum already exists, adding nodes to cluster ({} total nodes)",
                target.node_ips.len()
            ))
            .await?;

        self.management
            .modify_membership(host, &target.node_fault_domain_pairs())
            .await?;
        self.watcher.wait_for_quorum(first_added).await?;

        self.store
            .put_node_lists(&target.node_ips, &target.fault_domain_ids, &target.instance_ids)
            .await?;
        Ok(())
    }

    async fn remove_nodes(&self, plan: &OperationPlan) -> Result<()> {
        let target = &self.config.target;
        let host = self.coordinator();
        let count = target.target_node_count;

        let removed_ids = self.watcher.node_ids(&plan.removed_ips).await?;

        self.status
            .update(&format!(
                "Quorum already exists, removing {} nodes from cluster.",
                removed_ids.len()
            ))
            .await?;

        self.management
            .modify_membership(host, &target.fault_domain_pairs_for(count))
            .await?;
        self.watcher.wait_for_quorum(host).await?;

        self.status
            .update("New quorum formed, validating node removal.")
            .await?;
        let membership = self.watcher.wait_for_membership(host, count).await?;
        if let Some(stale) = membership.retained(&removed_ids).first() {
            return Err(ProvisionError::StateInconsistency(format!(
                "Old node {} not removed from quorum",
                stale
            )));
        }

        self.status
            .update(&format!(
                "New quorum formed with {} node(s) as requested.",
                count
            ))
            .await?;

        let keep = |list: &[String]| list.iter().take(count).cloned().collect::<Vec<_>>();
        self.store
            .put_node_lists(
                &keep(&target.node_ips),
                &keep(&target.fault_domain_ids),
                &keep(&target.instance_ids),
            )
            .await?;
        Ok(())
    }

    /// Apply the target floating IPs to a cluster that has none
    async fn apply_initial_floating_ips(&self, host: &str) -> Result<()> {
        let target = &self.config.target;
        if target.floating_ips.is_empty() {
            return Ok(());
        }

        info!("Setting initial floating IPs to {:?}", target.floating_ips);
        let config = NetworkConfig::with_floating_ips(&target.floating_ips, &target.floating_ip_netmask);
        self.management.put_network_config(host, &config).await?;

        loop {
            match self.management.network_status(host).await {
                Ok(status) if status.has_floating_addresses() => break,
                Ok(_) => {}
                Err(e) => warn!("Network status unavailable: {}", e),
            }
            info!("⏳ Waiting for network configuration to apply");
            tokio::time::sleep(self.config.polling.network_interval()).await;
        }

        self.status
            .update(&format!(
                "Successfully applied {} floating IPs: {:?}",
                target.floating_ips.len(),
                target.floating_ips
            ))
            .await?;
        self.store.put_floating_ips(&target.floating_ips).await?;
        Ok(())
    }

    /// Bring the cluster's floating IPs in line with the target
    async fn reconcile_floating_ips(&self) -> Result<()> {
        let target = &self.config.target;
        let host = self.coordinator();
        let mut current = self.management.network_config(host).await?;

        if current.frontend_network_count() == 0 || current.floating_ips().is_empty() {
            info!("No floating IPs configured, applying initial floating IPs");
            return self.apply_initial_floating_ips(host).await;
        }

        if current.floating_ips() == target.floating_ips {
            info!("No change in floating IPs");
            return Ok(());
        }

        info!("Updating floating IPs to {:?}", target.floating_ips);
        current
            .replace_floating_ips(&target.floating_ips)
            .map_err(|e| ProvisionError::StateInconsistency(format!("network config: {}", e)))?;
        self.management.put_network_config(host, &current).await?;

        self.status
            .update(&format!(
                "Successfully updated {} floating IPs: {:?}",
                target.floating_ips.len(),
                target.floating_ips
            ))
            .await?;
        self.store.put_floating_ips(&target.floating_ips).await?;
        Ok(())
    }

    async fn update_capacity(&self) -> Result<()> {
        let limit = self.config.target.capacity_limit;
        let host = self.coordinator();

        self.status
            .update(&format!("Increasing soft capacity limit to {}", limit))
            .await?;
        self.management.set_log_level(host, LogLevel::Debug).await?;
        self.management.set_capacity_clamp(host, limit).await?;
        info!("Soft capacity limit increased");
        self.watcher.wait_for_quorum(host).await?;
        self.management.set_log_level(host, LogLevel::Info).await?;
        self.store.put_capacity_limit(limit).await?;
        Ok(())
    }

    async fn add_buckets(&self, plan: &OperationPlan) -> Result<()> {
        let target = &self.config.target;
        let host = self.coordinator();

        self.verify_buckets_empty(&plan.new_bucket_names).await?;

        if !plan.new_bucket_uris.is_empty() {
            self.status
                .update(&format!(
                    "Adding {} buckets for persistent storage",
                    plan.new_bucket_names.len()
                ))
                .await?;
            self.management.set_log_level(host, LogLevel::Debug).await?;
            self.management
                .add_object_storage_uris(host, &plan.new_bucket_uris)
                .await?;
            info!("Buckets added");
        }

        self.store
            .put_bucket_lists(&target.bucket_names, &target.bucket_uris)
            .await?;
        self.update_capacity().await
    }

    async fn apply_tunables(&self, host: &str) -> Result<()> {
        let tunables = &self.config.tunables;
        let mut applied_blocks = 0;

        if tunables.refill_iops != 0 {
            self.management
                .set_tunable(host, IOPS_TUNABLE, tunables.refill_iops)
                .await?;
        }
        if tunables.refill_bps != 0 && tunables.disk_count != 0 {
            applied_blocks = tunables.refill_blocks_per_second();
            self.management
                .set_tunable(host, BLOCKS_TUNABLE, applied_blocks)
                .await?;
        }

        info!("Bouncing quorum to apply tunables");
        self.management.abandon_quorum_series(host).await?;
        self.watcher.wait_for_quorum(host).await?;
        self.management.set_log_level(host, LogLevel::Info).await?;

        self.store
            .put(
                keys::TUNABLES,
                &format!(
                    "refill_IOPS={}, refill_Bps={}",
                    tunables.refill_iops, applied_blocks
                ),
            )
            .await?;
        Ok(())
    }

    /// Label each instance with its cluster node id. Failures are logged only.
    async fn refresh_instance_labels(&self) {
        if let Err(e) = self.status.update("Updating cluster labels").await {
            warn!("Status update failed: {}", e);
        }

        let target = &self.config.target;
        let deployment = self.store.deployment();
        let nodes = target
            .node_ips
            .iter()
            .zip(&target.instance_ids)
            .take(target.target_node_count)
            .enumerate();

        for (i, (ip, instance_id)) in nodes {
            let number = i + 1;
            let result: Result<()> = async {
                let node_id: String = self
                    .watcher
                    .node_id(ip)
                    .await?
                    .chars()
                    .filter(char::is_ascii_digit)
                    .collect();
                let zone = self.cloud.instance_zone(instance_id).await?;
                self.cloud
                    .set_instance_label(
                        &format!("{}-node-{}", deployment, number),
                        &zone,
                        "name",
                        &format!("{}-node-{}-{}", deployment, number, node_id),
                    )
                    .await?;
                Ok(())
            }
            .await;

            if let Err(e) = result {
                warn!("Could not label instance {} ({}): {}", instance_id, ip, e);
            }
        }
    }
}
