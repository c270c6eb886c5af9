use cluster_provisioner::config::{
    CliConfig, EndpointConfig, PollingConfig, ProvisionerConfig, StoreConfig, Tunables,
};
use cluster_provisioner::domain::{ClusterTarget, StorageClass};

pub const TIB: u64 = 1_099_511_627_776;
pub const VERSION: &str = "7.6.0";
pub const SECRET_NAME: &str = "prod-abc12-secrets";
pub const ADMIN_PASSWORD: &str = "s3cret-admin";

/// Test data fixtures for consistent test data
pub struct TestFixtures;

impl TestFixtures {
    pub fn node_ips(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("10.0.0.{}", i)).collect()
    }

    /// Target for `count` nodes with one bucket and a 1 TiB limit
    pub fn target(count: usize) -> ClusterTarget {
        ClusterTarget {
            cluster_name: "prod".to_string(),
            node_ips: Self::node_ips(count),
            fault_domain_ids: (1..=count).map(|i| i.to_string()).collect(),
            instance_ids: (1..=count).map(|i| format!("i-{}", i)).collect(),
            target_node_count: count,
            number_azs: 1,
            bucket_names: vec!["bucket-1".to_string()],
            bucket_uris: vec!["gs://bucket-1".to_string()],
            capacity_limit: TIB,
            floating_ips: vec![],
            floating_ip_netmask: "10.1.0.0/24".to_string(),
            storage_class: StorageClass::HotGcsStd,
            replace: false,
            existing_deployment: None,
        }
    }

    /// Provisioner configuration that never sleeps between polls
    pub fn config(target: ClusterTarget) -> ProvisionerConfig {
        ProvisionerConfig {
            deployment_unique_name: "prod-abc12".to_string(),
            project: "test-project".to_string(),
            cluster_secrets_name: SECRET_NAME.to_string(),
            default_admin_password: "Admin123!".to_string(),
            host_instance_id: "9000".to_string(),
            target,
            tunables: Tunables::default(),
            store: StoreConfig {
                mongodb_uri: "mongodb://localhost:27017".to_string(),
                database: "provisioner-test".to_string(),
            },
            endpoints: EndpointConfig::default(),
            polling: PollingConfig {
                quorum_interval_secs: 0,
                membership_interval_secs: 0,
                reachability_interval_secs: 0,
                network_interval_secs: 0,
                quorum_wait_ceiling_secs: None,
            },
            cli: CliConfig::default(),
            required_packages: vec![],
            dev_environment: false,
            power_off_on_success: false,
            package_url: String::new(),
        }
    }
}
