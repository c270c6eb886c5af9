//! Observes cluster quorum through the admin interface.
//!
//! All waits poll at a fixed interval. A probe that errors counts as "not yet";
//! only the quorum wait can be bounded, and only when a ceiling is configured.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PollingConfig;
use crate::domain::{Membership, NodeProbe, QuorumSurvey};
use crate::error::{ProvisionError, Result};
use crate::infrastructure::management::ManagementClient;

pub struct QuorumWatcher {
    management: Arc<dyn ManagementClient>,
    polling: PollingConfig,
}

impl QuorumWatcher {
    pub fn new(management: Arc<dyn ManagementClient>, polling: PollingConfig) -> Self {
        Self { management, polling }
    }

    /// Block until `host` reports an active quorum
    pub async fn wait_for_quorum(&self, host: &str) -> Result<()> {
        let wait = async {
            loop {
                match self.management.node_state(host).await {
                    Ok(state) if state.is_active() => {
                        info!("✅ Quorum formed on {}", host);
                        return;
                    }
                    Ok(state) => debug!(host, state = %state.state, "Quorum not active"),
                    Err(e) => debug!(host, error = %e, "Quorum probe failed"),
                }
                info!("⏳ Waiting for quorum on {}", host);
                tokio::time::sleep(self.polling.quorum_interval()).await;
            }
        };

        match self.polling.quorum_wait_ceiling() {
            None => {
                wait.await;
                Ok(())
            }
            Some(ceiling) => tokio::time::timeout(ceiling, wait).await.map_err(|_| {
                ProvisionError::Timeout(format!("active quorum on {} after {:?}", host, ceiling))
            }),
        }
    }

    /// Probe every node's quorum state and software version. Unreachable
    /// nodes count as out of quorum with an unknown version.
    pub async fn survey(&self, node_ips: &[String]) -> QuorumSurvey {
        let mut nodes = Vec::with_capacity(node_ips.len());

        for ip in node_ips {
            let in_quorum = match self.management.node_state(ip).await {
                Ok(state) => state.is_active(),
                Err(e) => {
                    debug!(ip = %ip, error = %e, "Node state unavailable");
                    false
                }
            };
            let version = match self.management.version(ip).await {
                Ok(info) => Some(info.revision_id),
                Err(e) => {
                    debug!(ip = %ip, error = %e, "Node version unavailable");
                    None
                }
            };
            nodes.push(NodeProbe {
                ip: ip.clone(),
                in_quorum,
                version,
            });
        }

        let survey = QuorumSurvey {
            nodes,
            membership: None,
        };
        info!(
            "📊 Quorum survey: {} in quorum, {} out of quorum",
            survey.in_quorum(),
            survey.out_of_quorum()
        );
        survey
    }

    /// Typed all/in/out membership as reported by `coordinator`
    pub async fn parse_membership(&self, coordinator: &str) -> Result<Membership> {
        Ok(self.management.quorum_details(coordinator).await?)
    }

    /// Poll until the membership has exactly `expected` nodes, all in quorum
    pub async fn wait_for_membership(&self, coordinator: &str, expected: usize) -> Result<Membership> {
        loop {
            match self.management.quorum_details(coordinator).await {
                Ok(membership) if membership.is_converged_to(expected) => return Ok(membership),
                Ok(membership) => debug!(
                    all = membership.all_nodes.len(),
                    in_quorum = membership.in_nodes.len(),
                    out = membership.out_nodes.len(),
                    expected,
                    "Membership not converged"
                ),
                Err(e) => debug!(error = %e, "Membership probe failed"),
            }
            tokio::time::sleep(self.polling.membership_interval()).await;
        }
    }

    /// Cluster node id of the node at `ip`
    pub async fn node_id(&self, ip: &str) -> Result<String> {
        let state = self.management.node_state(ip).await?;
        state.node_id.ok_or_else(|| {
            ProvisionError::StateInconsistency(format!("node {} did not report a node id", ip))
        })
    }

    /// Node ids for `node_ips`, in order
    pub async fn node_ids(&self, node_ips: &[String]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(node_ips.len());
        for ip in node_ips {
            let id = self.node_id(ip).await?;
            info!("node_id={} ({})", id, ip);
            ids.push(id);
        }
        Ok(ids)
    }
}
