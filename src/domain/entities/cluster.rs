//! Cluster domain entities and types
//!
//! This module defines the desired state supplied at boot, the persisted
//! actual state of a deployment, and the transient survey gathered by probing
//! the live nodes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ProvisionError, Result};

/// Object storage class backing the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    HotGcsStd,
    HotS3Int,
    ColdS3Ia,
    ColdS3Gir,
}

impl StorageClass {
    /// Product type passed to the cluster at formation
    pub fn product_type(&self) -> &'static str {
        match self {
            StorageClass::HotGcsStd => "ACTIVE_WITH_STANDARD_STORAGE",
            StorageClass::HotS3Int => "ACTIVE_WITH_INTELLIGENT_STORAGE",
            StorageClass::ColdS3Ia => "ARCHIVE_WITH_IA_STORAGE",
            StorageClass::ColdS3Gir => "ARCHIVE_WITH_GIR_STORAGE",
        }
    }

    fn tier(&self) -> &'static str {
        match self {
            StorageClass::HotGcsStd | StorageClass::HotS3Int => "Hot",
            StorageClass::ColdS3Ia | StorageClass::ColdS3Gir => "Cold",
        }
    }

    fn object_storage(&self) -> &'static str {
        match self {
            StorageClass::HotGcsStd => "Standard",
            StorageClass::HotS3Int => "Intelligent Tiering",
            StorageClass::ColdS3Ia => "Infrequent Access",
            StorageClass::ColdS3Gir => "Glacier Instant Retrieval",
        }
    }

    /// Human-readable classification persisted as `cluster-type`
    pub fn classification(&self) -> String {
        format!("CNQ={}, GCS={}", self.tier(), self.object_storage())
    }
}

impl std::str::FromStr for StorageClass {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hot_gcs_std" => Ok(StorageClass::HotGcsStd),
            "hot_s3_int" => Ok(StorageClass::HotS3Int),
            "cold_s3_ia" => Ok(StorageClass::ColdS3Ia),
            "cold_s3_gir" => Ok(StorageClass::ColdS3Gir),
            other => Err(ProvisionError::Config(format!(
                "Unknown storage type: {}",
                other
            ))),
        }
    }
}

/// Desired cluster state supplied at boot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTarget {
    pub cluster_name: String,
    /// Node IPs; index 0 is the coordinator
    pub node_ips: Vec<String>,
    /// Fault domain per node, same order as `node_ips`
    pub fault_domain_ids: Vec<String>,
    /// VM instance id per node, same order as `node_ips`
    pub instance_ids: Vec<String>,
    pub target_node_count: usize,
    #[serde(default = "default_number_azs")]
    pub number_azs: u32,
    pub bucket_names: Vec<String>,
    pub bucket_uris: Vec<String>,
    /// Soft capacity limit in bytes
    pub capacity_limit: u64,
    #[serde(default)]
    pub floating_ips: Vec<String>,
    /// Netmask applied to the floating IP block
    #[serde(default)]
    pub floating_ip_netmask: String,
    pub storage_class: StorageClass,
    /// Swap the node set of a prior deployment's cluster
    #[serde(default)]
    pub replace: bool,
    /// Unique name of the deployment being replaced
    #[serde(default)]
    pub existing_deployment: Option<String>,
}

fn default_number_azs() -> u32 {
    1
}

impl ClusterTarget {
    /// The node addressed for cluster-wide administrative commands
    pub fn coordinator(&self) -> &str {
        self.node_ips.first().map(String::as_str).unwrap_or_default()
    }

    /// Check the structural invariants of the target
    pub fn validate(&self) -> Result<()> {
        if self.node_ips.is_empty() {
            return Err(ProvisionError::Config("node_ips must not be empty".into()));
        }

        if self.fault_domain_ids.len() != self.node_ips.len()
            || self.instance_ids.len() != self.node_ips.len()
        {
            return Err(ProvisionError::Config(format!(
                "node_ips ({}), fault_domain_ids ({}) and instance_ids ({}) must have equal length",
                self.node_ips.len(),
                self.fault_domain_ids.len(),
                self.instance_ids.len()
            )));
        }

        if self.bucket_names.len() != self.bucket_uris.len() {
            return Err(ProvisionError::Config(format!(
                "bucket_names ({}) and bucket_uris ({}) must have equal length",
                self.bucket_names.len(),
                self.bucket_uris.len()
            )));
        }

        if self.target_node_count == 0 || self.target_node_count > self.node_ips.len() {
            return Err(ProvisionError::Config(format!(
                "target_node_count {} must be between 1 and the number of node IPs ({})",
                self.target_node_count,
                self.node_ips.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.node_ips.iter().find(|ip| !seen.insert(ip.as_str())) {
            return Err(ProvisionError::Config(format!("duplicate node IP {}", dup)));
        }

        if self.replace && self.existing_deployment.as_deref().unwrap_or("").is_empty() {
            return Err(ProvisionError::Config(
                "replacement requires existing_deployment".into(),
            ));
        }

        Ok(())
    }

    /// `ip,fault_domain` pairs for every configured node
    pub fn node_fault_domain_pairs(&self) -> Vec<String> {
        self.fault_domain_pairs_for(self.node_ips.len())
    }

    /// `ip,fault_domain` pairs for the first `count` nodes
    pub fn fault_domain_pairs_for(&self, count: usize) -> Vec<String> {
        self.node_ips
            .iter()
            .zip(&self.fault_domain_ids)
            .take(count)
            .map(|(ip, fd)| format!("{},{}", ip, fd))
            .collect()
    }
}

/// Persisted actual state of one deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub node_ips: Vec<String>,
    pub fault_domain_ids: Vec<String>,
    pub instance_ids: Vec<String>,
    pub bucket_names: Vec<String>,
    pub bucket_uris: Vec<String>,
    pub soft_capacity_limit: Option<u64>,
    pub installed_version: Option<String>,
    pub creation_version: Option<String>,
    pub cluster_type: Option<String>,
    pub uuid: Option<String>,
    pub float_ips: Vec<String>,
}

impl ClusterRecord {
    /// Whether a cluster has been formed and recorded for this deployment
    pub fn has_nodes(&self) -> bool {
        !self.node_ips.is_empty()
    }
}

/// Cluster-wide membership as reported by the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub all_nodes: Vec<String>,
    pub in_nodes: Vec<String>,
    pub out_nodes: Vec<String>,
}

impl Membership {
    /// Every node is in quorum and the membership has exactly `size` nodes
    pub fn is_converged_to(&self, size: usize) -> bool {
        self.all_nodes.len() == size && self.in_nodes.len() == size && self.out_nodes.is_empty()
    }

    /// Ids from `ids` that are still members
    pub fn retained<'a>(&self, ids: &'a [String]) -> Vec<&'a String> {
        ids.iter().filter(|id| self.all_nodes.contains(id)).collect()
    }
}

/// Result of probing one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProbe {
    pub ip: String,
    pub in_quorum: bool,
    /// Software version, `None` if the node could not be queried
    pub version: Option<String>,
}

/// Per-run view of the live cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuorumSurvey {
    pub nodes: Vec<NodeProbe>,
    /// Detailed membership, gathered only for a pre-existing cluster
    pub membership: Option<Membership>,
}

impl QuorumSurvey {
    pub fn in_quorum(&self) -> usize {
        self.nodes.iter().filter(|n| n.in_quorum).count()
    }

    pub fn out_of_quorum(&self) -> usize {
        self.nodes.iter().filter(|n| !n.in_quorum).count()
    }

    /// No node participates in a quorum: no cluster has been formed yet
    pub fn is_unformed(&self) -> bool {
        self.out_of_quorum() == self.nodes.len() && self.in_quorum() == 0
    }

    /// Version reported by the node at `ip`
    pub fn version_of(&self, ip: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.ip == ip)
            .and_then(|n| n.version.as_deref())
    }

    /// Version reported by the first probed node (the coordinator)
    pub fn coordinator_version(&self) -> Option<&str> {
        self.nodes.first().and_then(|n| n.version.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ClusterTarget {
        ClusterTarget {
            cluster_name: "prod".into(),
            node_ips: vec!["10.0.0.1".into(), "10.0.0.2".into(), "10.0.0.3".into()],
            fault_domain_ids: vec!["1".into(), "2".into(), "3".into()],
            instance_ids: vec!["i-1".into(), "i-2".into(), "i-3".into()],
            target_node_count: 3,
            number_azs: 1,
            bucket_names: vec!["b1".into()],
            bucket_uris: vec!["gs://b1".into()],
            capacity_limit: 1 << 40,
            floating_ips: vec![],
            floating_ip_netmask: "10.0.0.0/24".into(),
            storage_class: StorageClass::HotGcsStd,
            replace: false,
            existing_deployment: None,
        }
    }

    #[test]
    fn test_validate_accepts_consistent_target() {
        assert!(target().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_arrays() {
        let mut t = target();
        t.fault_domain_ids.pop();
        assert!(matches!(t.validate(), Err(ProvisionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ips() {
        let mut t = target();
        t.node_ips[2] = "10.0.0.1".into();
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_replace_without_prior_deployment() {
        let mut t = target();
        t.replace = true;
        assert!(t.validate().is_err());
        t.existing_deployment = Some("old".into());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_fault_domain_pairs() {
        let t = target();
        assert_eq!(
            t.node_fault_domain_pairs(),
            vec!["10.0.0.1,1", "10.0.0.2,2", "10.0.0.3,3"]
        );
        assert_eq!(t.fault_domain_pairs_for(2), vec!["10.0.0.1,1", "10.0.0.2,2"]);
    }

    #[test]
    fn test_storage_class_parsing() {
        let class: StorageClass = "cold_s3_ia".parse().unwrap();
        assert_eq!(class.product_type(), "ARCHIVE_WITH_IA_STORAGE");
        assert_eq!(class.classification(), "CNQ=Cold, GCS=Infrequent Access");
        assert_eq!(StorageClass::HotGcsStd.classification(), "CNQ=Hot, GCS=Standard");
        assert!("warm".parse::<StorageClass>().is_err());
    }

    #[test]
    fn test_survey_counts() {
        let survey = QuorumSurvey {
            nodes: vec![
                NodeProbe { ip: "a".into(), in_quorum: false, version: None },
                NodeProbe { ip: "b".into(), in_quorum: false, version: Some("7.6.0".into()) },
            ],
            membership: None,
        };
        assert!(survey.is_unformed());
        assert_eq!(survey.version_of("b"), Some("7.6.0"));
        assert_eq!(survey.coordinator_version(), None);
    }
}
