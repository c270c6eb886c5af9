//! Decides which lifecycle operations a run must perform.
//!
//! Planning is pure: it compares the target against the persisted record (or
//! the prior deployment's record when replacing) and the live survey, and
//! never talks to the cluster.

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::domain::{ClusterRecord, ClusterTarget, QuorumSurvey};
use crate::error::{ProvisionError, Result};

/// Operations for one run, with the deltas they act on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationPlan {
    pub new_cluster: bool,
    pub replace_cluster: bool,
    pub add_nodes: bool,
    pub remove_nodes: bool,
    pub add_buckets: bool,
    pub increase_limit: bool,
    /// Target IPs not yet in the cluster
    pub added_ips: Vec<String>,
    /// Persisted IPs beyond the target node count
    pub removed_ips: Vec<String>,
    /// Node IPs kept after removal
    pub remaining_ips: Vec<String>,
    pub new_bucket_names: Vec<String>,
    pub new_bucket_uris: Vec<String>,
}

impl OperationPlan {
    pub fn operations(&self) -> Vec<&'static str> {
        [
            (self.new_cluster, "new_cluster"),
            (self.replace_cluster, "replace_cluster"),
            (self.add_nodes, "add_nodes"),
            (self.remove_nodes, "remove_nodes"),
            (self.add_buckets, "add_buckets"),
            (self.increase_limit, "increase_limit"),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| name)
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.operations().is_empty()
    }
}

impl fmt::Display for OperationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", self.operations().join(", "))
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StateReconciler;

impl StateReconciler {
    pub fn new() -> Self {
        Self
    }

    /// Compute the plan for this run.
    ///
    /// `prior` is the record of the deployment being replaced, if any.
    pub fn plan(
        &self,
        target: &ClusterTarget,
        record: &ClusterRecord,
        prior: Option<&ClusterRecord>,
        survey: &QuorumSurvey,
    ) -> Result<OperationPlan> {
        let mut plan = OperationPlan::default();

        if survey.is_unformed() {
            if target.replace {
                let prior_has_nodes = prior
                    .map(|p| !p.node_ips.is_empty() && !p.instance_ids.is_empty())
                    .unwrap_or(false);
                if !prior_has_nodes {
                    return Err(ProvisionError::StateInconsistency(
                        "Cannot find existing cluster information for replacement".into(),
                    ));
                }
                info!("DECISION: REPLACE CLUSTER (all nodes out of quorum)");
                plan.replace_cluster = true;
            } else {
                info!("DECISION: NEW CLUSTER (all nodes out of quorum)");
                plan.new_cluster = true;
            }
        } else {
            info!("DECISION: EXISTING CLUSTER detected");
            self.plan_membership(target, record, survey, &mut plan)?;
        }

        let base = if plan.replace_cluster {
            prior.unwrap_or(record)
        } else {
            record
        };

        if !plan.new_cluster {
            plan.new_bucket_names = missing(&target.bucket_names, &base.bucket_names);
            plan.new_bucket_uris = missing(&target.bucket_uris, &base.bucket_uris);
            if !plan.new_bucket_names.is_empty() && !plan.new_bucket_uris.is_empty() {
                info!("DECISION: ADD BUCKETS - {:?}", plan.new_bucket_names);
                plan.add_buckets = true;
            }

            if let Some(limit) = base.soft_capacity_limit {
                if target.capacity_limit > limit && !plan.add_buckets {
                    info!(
                        "DECISION: INCREASE CAPACITY - from {} to {}",
                        limit, target.capacity_limit
                    );
                    plan.increase_limit = true;
                }
            }
        }

        info!("OPERATIONS TO EXECUTE: {}", plan);
        Ok(plan)
    }

    fn plan_membership(
        &self,
        target: &ClusterTarget,
        record: &ClusterRecord,
        survey: &QuorumSurvey,
        plan: &mut OperationPlan,
    ) -> Result<()> {
        if target.replace {
            return Err(ProvisionError::StateInconsistency(
                "Cannot replace cluster without deploying new nodes".into(),
            ));
        }

        let membership = survey.membership.as_ref().ok_or_else(|| {
            ProvisionError::StateInconsistency(
                "membership of the existing cluster was not surveyed".into(),
            )
        })?;
        if !membership.out_nodes.is_empty() {
            return Err(ProvisionError::StateInconsistency(
                "One or more nodes out of quorum in existing cluster. \
                 Rectify and restart the provisioner instance."
                    .into(),
            ));
        }

        if !record.has_nodes() {
            return Ok(());
        }

        plan.added_ips = missing(&target.node_ips, &record.node_ips);
        if let Some(first) = plan.added_ips.first() {
            let added_version = survey.version_of(first).unwrap_or("unknown");
            let installed = record.installed_version.as_deref().unwrap_or("unknown");
            if added_version != installed {
                return Err(ProvisionError::VersionMismatch(format!(
                    "Cluster is running ver={}. Can't add nodes running ver={}. \
                     Update the deployment with the previous node count to remove these nodes.",
                    installed, added_version
                )));
            }
            info!("DECISION: ADD NODES - {:?}", plan.added_ips);
            plan.add_nodes = true;
        }

        if record.node_ips.len() > target.target_node_count {
            plan.removed_ips = record.node_ips[target.target_node_count..].to_vec();
            plan.remaining_ips = target
                .node_ips
                .iter()
                .take(target.target_node_count)
                .cloned()
                .collect();
            info!(
                "DECISION: REMOVE NODES - removing {} nodes",
                plan.removed_ips.len()
            );
            plan.remove_nodes = true;
        }

        Ok(())
    }
}

/// Items of `wanted` absent from `have`, in `wanted` order
fn missing(wanted: &[String], have: &[String]) -> Vec<String> {
    wanted
        .iter()
        .filter(|item| !have.contains(item))
        .cloned()
        .collect()
}
