use async_trait::async_trait;
use cluster_provisioner::domain::Membership;
use cluster_provisioner::infrastructure::cloud::{CloudError, CloudPlatform, CloudResult};
use cluster_provisioner::infrastructure::management::{
    CreateClusterRequest, ManagementClient, ManagementError, NetworkConfig, NetworkStatus,
    NodeState, RawMethod, VersionInfo,
};
use cluster_provisioner::infrastructure::management::ManagementResult;
use cluster_provisioner::infrastructure::probe::EndpointProbe;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// One call made against a mock collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub name: String,
    pub host: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
struct MockNode {
    node_id: String,
    version: Option<String>,
    active: bool,
    reachable: bool,
}

#[derive(Debug, Default)]
struct ClusterState {
    nodes: HashMap<String, MockNode>,
    cluster_id: Option<String>,
    membership: Membership,
    network_config: Option<NetworkConfig>,
    /// Node ids that refuse to leave the membership
    sticky_ids: Vec<String>,
    failing: HashSet<String>,
    calls: Vec<RecordedCall>,
}

/// In-process stand-in for the cluster admin interface.
///
/// Forming a cluster or changing membership updates the simulated quorum so
/// that the provisioner's waits complete immediately.
#[derive(Clone, Default)]
pub struct MockManagementClient {
    state: Arc<Mutex<ClusterState>>,
}

impl MockManagementClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a booted node that is not part of any quorum
    pub fn add_node(&self, ip: &str, node_id: &str, version: &str) {
        self.state.lock().unwrap().nodes.insert(
            ip.to_string(),
            MockNode {
                node_id: node_id.to_string(),
                version: Some(version.to_string()),
                active: false,
                reachable: true,
            },
        );
    }

    /// Mark `ips` as an already formed cluster in full quorum
    pub fn form_existing_cluster(&self, ips: &[&str], cluster_id: &str) {
        let mut state = self.state.lock().unwrap();
        let mut ids = Vec::new();
        for ip in ips {
            if let Some(node) = state.nodes.get_mut(*ip) {
                node.active = true;
                ids.push(node.node_id.clone());
            }
        }
        state.cluster_id = Some(cluster_id.to_string());
        state.membership = Membership {
            all_nodes: ids.clone(),
            in_nodes: ids,
            out_nodes: Vec::new(),
        };
    }

    pub fn set_unreachable(&self, ip: &str) {
        if let Some(node) = self.state.lock().unwrap().nodes.get_mut(ip) {
            node.reachable = false;
        }
    }

    pub fn set_out_nodes(&self, ids: &[&str]) {
        self.state.lock().unwrap().membership.out_nodes = ids.iter().map(|s| s.to_string()).collect();
    }

    /// Keep `id` in the membership even when asked to remove it; the member
    /// count still matches the request
    pub fn make_sticky(&self, id: &str) {
        self.state.lock().unwrap().sticky_ids.push(id.to_string());
    }

    pub fn set_network_config(&self, config: NetworkConfig) {
        self.state.lock().unwrap().network_config = Some(config);
    }

    pub fn network_config_snapshot(&self) -> Option<NetworkConfig> {
        self.state.lock().unwrap().network_config.clone()
    }

    pub fn fail_on(&self, name: &str) {
        self.state.lock().unwrap().failing.insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_named(&self, name: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.name == name).collect()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.name).collect()
    }

    fn record(&self, name: &str, host: &str, args: Vec<String>) -> ManagementResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            name: name.to_string(),
            host: host.to_string(),
            args,
        });
        if state.failing.contains(name) {
            return Err(ManagementError::CommandFailed {
                subcommand: name.to_string(),
                status: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn reachable_node(&self, name: &str, host: &str) -> ManagementResult<MockNode> {
        let state = self.state.lock().unwrap();
        match state.nodes.get(host) {
            Some(node) if node.reachable => Ok(node.clone()),
            _ => Err(ManagementError::CommandFailed {
                subcommand: name.to_string(),
                status: Some(1),
                stderr: format!("could not connect to {}", host),
            }),
        }
    }

    /// Make the nodes behind `pairs` the whole membership
    fn apply_membership(&self, pairs: &[String]) {
        let mut state = self.state.lock().unwrap();
        let wanted: Vec<String> = pairs
            .iter()
            .filter_map(|pair| pair.split(',').next())
            .map(str::to_string)
            .collect();

        let mut ids = Vec::new();
        for (ip, node) in state.nodes.iter_mut() {
            node.active = wanted.contains(ip);
            if node.active {
                ids.push(node.node_id.clone());
            }
        }
        ids.sort();
        // a stuck node keeps its seat, hiding one of the wanted nodes
        let sticky = state.sticky_ids.clone();
        for id in sticky {
            if !ids.contains(&id) {
                ids.pop();
                ids.push(id);
            }
        }
        state.membership = Membership {
            all_nodes: ids.clone(),
            in_nodes: ids,
            out_nodes: Vec::new(),
        };
    }
}

#[async_trait]
impl ManagementClient for MockManagementClient {
    async fn install(&self, host: &str) -> ManagementResult<()> {
        self.record("install", host, vec![])
    }

    async fn node_state(&self, host: &str) -> ManagementResult<NodeState> {
        self.record("node_state_get", host, vec![])?;
        let node = self.reachable_node("node_state_get", host)?;
        let cluster_id = self.state.lock().unwrap().cluster_id.clone();
        Ok(NodeState {
            state: if node.active { "ACTIVE" } else { "STOPPED" }.to_string(),
            node_id: Some(node.node_id),
            cluster_id: if node.active { cluster_id } else { None },
        })
    }

    async fn version(&self, host: &str) -> ManagementResult<VersionInfo> {
        self.record("version", host, vec![])?;
        let node = self.reachable_node("version", host)?;
        Ok(VersionInfo {
            revision_id: node.version.unwrap_or_default(),
        })
    }

    async fn login(&self, host: &str, password: &str) -> ManagementResult<()> {
        self.record("login", host, vec![password.to_string()])
    }

    async fn change_password(&self, host: &str, old: &str, new: &str) -> ManagementResult<()> {
        self.record("change_password", host, vec![old.to_string(), new.to_string()])
    }

    async fn create_cluster(&self, host: &str, request: &CreateClusterRequest) -> ManagementResult<()> {
        let mut args = request.node_ips_and_fault_domains.clone();
        args.extend(request.object_storage_uris.iter().cloned());
        args.push(request.usable_capacity_clamp.to_string());
        args.push(request.product_type.clone());
        self.record("create_object_backed_cluster", host, args)?;

        self.state.lock().unwrap().cluster_id = Some("cluster-uuid-1".to_string());
        self.apply_membership(&request.node_ips_and_fault_domains);
        Ok(())
    }

    async fn modify_membership(&self, host: &str, node_ips_and_fault_domains: &[String]) -> ManagementResult<()> {
        self.record(
            "modify_object_backed_cluster_membership",
            host,
            node_ips_and_fault_domains.to_vec(),
        )?;
        self.apply_membership(node_ips_and_fault_domains);
        Ok(())
    }

    async fn add_object_storage_uris(&self, host: &str, uris: &[String]) -> ManagementResult<()> {
        self.record("add_object_storage_uris", host, uris.to_vec())
    }

    async fn set_capacity_clamp(&self, host: &str, clamp: u64) -> ManagementResult<()> {
        self.record("capacity_clamp_set", host, vec![clamp.to_string()])
    }

    async fn quorum_details(&self, host: &str) -> ManagementResult<Membership> {
        self.record("quorum_details", host, vec![])?;
        Ok(self.state.lock().unwrap().membership.clone())
    }

    async fn network_config(&self, host: &str) -> ManagementResult<NetworkConfig> {
        self.record("network_v3_get_config", host, vec![])?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .network_config
            .clone()
            .unwrap_or_else(|| NetworkConfig(serde_json::json!({"frontend_networks": []}))))
    }

    async fn put_network_config(&self, host: &str, config: &NetworkConfig) -> ManagementResult<()> {
        self.record("network_v3_put_config", host, config.floating_ips())?;
        self.state.lock().unwrap().network_config = Some(config.clone());
        Ok(())
    }

    async fn network_status(&self, host: &str) -> ManagementResult<NetworkStatus> {
        self.record("network_v3_status", host, vec![])?;
        let has_floats = self
            .state
            .lock()
            .unwrap()
            .network_config
            .as_ref()
            .map(|c| !c.floating_ips().is_empty())
            .unwrap_or(false);
        Ok(NetworkStatus {
            raw: if has_floats {
                r#"{"floating_addresses": ["10.1.0.1"]}"#.to_string()
            } else {
                "{}".to_string()
            },
        })
    }

    async fn set_monitoring(&self, host: &str, mq_host: &str, nexus_host: &str) -> ManagementResult<()> {
        self.record(
            "set_monitoring_conf",
            host,
            vec![mq_host.to_string(), nexus_host.to_string()],
        )
    }

    async fn raw(
        &self,
        host: &str,
        method: RawMethod,
        path: &str,
        body: Option<&str>,
    ) -> ManagementResult<String> {
        let mut args = vec![method.as_str().to_string(), path.to_string()];
        if let Some(body) = body {
            args.push(body.to_string());
        }
        self.record("raw", host, args)?;
        Ok(String::new())
    }
}

#[derive(Default)]
struct CloudState {
    secrets: HashMap<String, Vec<String>>,
    non_empty_buckets: HashSet<String>,
    labels: Vec<(String, String, String)>,
    firewall_updates: Vec<(String, String)>,
    fail_labels: bool,
}

/// Cloud control plane double
#[derive(Clone, Default)]
pub struct MockCloud {
    state: Arc<Mutex<CloudState>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, name: &str, value: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .secrets
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn fill_bucket(&self, bucket: &str) {
        self.state.lock().unwrap().non_empty_buckets.insert(bucket.to_string());
    }

    pub fn fail_labels(&self) {
        self.state.lock().unwrap().fail_labels = true;
    }

    pub fn secret_versions(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn labels(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().labels.clone()
    }

    pub fn firewall_updates(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().firewall_updates.clone()
    }
}

#[async_trait]
impl CloudPlatform for MockCloud {
    async fn access_secret(&self, name: &str) -> CloudResult<String> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(name)
            .and_then(|versions| versions.last().cloned())
            .ok_or_else(|| CloudError::NotFound(format!("secret {}", name)))
    }

    async fn add_secret_version(&self, name: &str, value: &str) -> CloudResult<()> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    async fn bucket_is_empty(&self, bucket: &str) -> CloudResult<bool> {
        Ok(!self.state.lock().unwrap().non_empty_buckets.contains(bucket))
    }

    async fn allow_cross_deployment_traffic(&self, existing: &str, current: &str) -> CloudResult<()> {
        self.state
            .lock()
            .unwrap()
            .firewall_updates
            .push((existing.to_string(), current.to_string()));
        Ok(())
    }

    async fn instance_zone(&self, _instance_id: &str) -> CloudResult<String> {
        Ok("us-central1-a".to_string())
    }

    async fn set_instance_label(
        &self,
        instance_name: &str,
        _zone: &str,
        key: &str,
        value: &str,
    ) -> CloudResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_labels {
            return Err(CloudError::CommandFailed {
                operation: "compute instances update".to_string(),
                stderr: "permission denied".to_string(),
            });
        }
        state
            .labels
            .push((instance_name.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }
}

/// Endpoint probe double; every URL is reachable unless listed
#[derive(Clone, Default)]
pub struct MockProbe {
    unreachable: Arc<Mutex<HashSet<String>>>,
    probed: Arc<Mutex<Vec<(String, bool)>>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    pub fn probed(&self) -> Vec<(String, bool)> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl EndpointProbe for MockProbe {
    async fn is_reachable(&self, url: &str, relaxed_tls: bool) -> bool {
        self.probed
            .lock()
            .unwrap()
            .push((url.to_string(), relaxed_tls));
        !self.unreachable.lock().unwrap().contains(url)
    }
}
