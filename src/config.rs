//! Provisioner configuration.
//!
//! Loaded from the environment (a `.env` file is honoured) or from a YAML file
//! passed on the command line. The target cluster description lives under
//! `target`; everything else tunes how the provisioner talks to the world.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{ClusterTarget, StorageClass};
use crate::error::{ProvisionError, Result};
use crate::storage::encoding::decode_list;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Unique name of this deployment; also the state store collection
    pub deployment_unique_name: String,
    pub project: String,
    /// Secret holding the cluster admin password
    pub cluster_secrets_name: String,
    /// Password the cluster is formed with before rotation
    #[serde(default = "default_admin_password")]
    pub default_admin_password: String,
    /// Instance id of the VM running the provisioner
    pub host_instance_id: String,
    pub target: ClusterTarget,
    #[serde(default)]
    pub tunables: Tunables,
    pub store: StoreConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub cli: CliConfig,
    /// Host packages installed before provisioning starts
    #[serde(default)]
    pub required_packages: Vec<String>,
    #[serde(default)]
    pub dev_environment: bool,
    /// Power the provisioner VM off after a successful run outside dev
    #[serde(default = "default_true")]
    pub power_off_on_success: bool,
    /// Location of the cluster software package, reported in status only
    #[serde(default)]
    pub package_url: String,
}

/// Performance tunables applied after formation or replacement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunables {
    pub refill_iops: u64,
    /// Refill bandwidth in MB/s
    pub refill_bps: u64,
    pub disk_count: u64,
}

impl Tunables {
    /// Bandwidth refill expressed in 4 KiB device blocks per second
    pub fn refill_blocks_per_second(&self) -> u64 {
        self.refill_bps * 1000 * 1000 / 4096
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub mongodb_uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Telemetry endpoint; unreachable aborts the run
    pub telemetry_url: String,
    /// Internet check; unreachable only warns
    pub internet_url: String,
    pub admin_port: u16,
    pub minimum_version: String,
    pub staging_mq_host: String,
    pub staging_nexus_host: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            telemetry_url: "https://api.missionq.qumulo.com/".to_string(),
            internet_url: "https://google.com".to_string(),
            admin_port: 8000,
            minimum_version: "7.6.0".to_string(),
            staging_mq_host: "staging-missionq.qumulo.com".to_string(),
            staging_nexus_host: "api.spog-staging.qumulo.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub quorum_interval_secs: u64,
    pub membership_interval_secs: u64,
    pub reachability_interval_secs: u64,
    pub network_interval_secs: u64,
    /// Give up waiting for quorum after this long; unbounded when unset
    pub quorum_wait_ceiling_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            quorum_interval_secs: 5,
            membership_interval_secs: 10,
            reachability_interval_secs: 5,
            network_interval_secs: 5,
            quorum_wait_ceiling_secs: None,
        }
    }
}

impl PollingConfig {
    pub fn quorum_interval(&self) -> Duration {
        Duration::from_secs(self.quorum_interval_secs)
    }

    pub fn membership_interval(&self) -> Duration {
        Duration::from_secs(self.membership_interval_secs)
    }

    pub fn reachability_interval(&self) -> Duration {
        Duration::from_secs(self.reachability_interval_secs)
    }

    pub fn network_interval(&self) -> Duration {
        Duration::from_secs(self.network_interval_secs)
    }

    pub fn quorum_wait_ceiling(&self) -> Option<Duration> {
        self.quorum_wait_ceiling_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub admin_cli_path: PathBuf,
    pub gcloud_path: PathBuf,
    pub work_dir: PathBuf,
    pub query_timeout_secs: u64,
    pub mutation_timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            admin_cli_path: PathBuf::from("./qq"),
            gcloud_path: PathBuf::from("gcloud"),
            work_dir: PathBuf::from("."),
            query_timeout_secs: 30,
            mutation_timeout_secs: 300,
        }
    }
}

fn default_admin_password() -> String {
    "Admin123!".to_string()
}

fn default_true() -> bool {
    true
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ProvisionError::Config(format!("{} must be set", name)))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ProvisionError::Config(format!("{} must be a number, got {:?}", name, raw))),
    }
}

fn flag(name: &str) -> bool {
    optional(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn list(name: &str) -> Vec<String> {
    optional(name).map(|v| decode_list(&v)).unwrap_or_default()
}

impl ProvisionerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let node_ips = list("NODE_IPS");
        let target_node_count = parsed("TARGET_NODE_COUNT", node_ips.len())?;
        let storage_class: StorageClass = required("STORAGE_CLASS")?.parse()?;

        let target = ClusterTarget {
            cluster_name: required("CLUSTER_NAME")?,
            node_ips,
            fault_domain_ids: list("FAULT_DOMAIN_IDS"),
            instance_ids: list("INSTANCE_IDS"),
            target_node_count,
            number_azs: parsed("NUMBER_AZS", 1)?,
            bucket_names: list("BUCKET_NAMES"),
            bucket_uris: list("BUCKET_URIS"),
            capacity_limit: parsed("CAPACITY_LIMIT", 0)?,
            floating_ips: list("FLOATING_IPS"),
            floating_ip_netmask: optional("FLOATING_IP_NETMASK").unwrap_or_default(),
            storage_class,
            replace: flag("REPLACE_CLUSTER"),
            existing_deployment: optional("EXISTING_DEPLOYMENT_NAME"),
        };

        let endpoint_defaults = EndpointConfig::default();
        let polling_defaults = PollingConfig::default();
        let cli_defaults = CliConfig::default();

        let config = ProvisionerConfig {
            deployment_unique_name: required("DEPLOYMENT_UNIQUE_NAME")?,
            project: required("PROJECT")?,
            cluster_secrets_name: required("CLUSTER_SECRETS_NAME")?,
            default_admin_password: optional("DEFAULT_ADMIN_PASSWORD")
                .unwrap_or_else(default_admin_password),
            host_instance_id: required("HOST_INSTANCE_ID")?,
            target,
            tunables: Tunables {
                refill_iops: parsed("TUN_REFILL_IOPS", 0)?,
                refill_bps: parsed("TUN_REFILL_BPS", 0)?,
                disk_count: parsed("TUN_DISK_COUNT", 0)?,
            },
            store: StoreConfig {
                mongodb_uri: required("MONGODB_URI")?,
                database: optional("MONGODB_DATABASE").unwrap_or_else(|| "provisioner".to_string()),
            },
            endpoints: EndpointConfig {
                telemetry_url: optional("TELEMETRY_URL").unwrap_or(endpoint_defaults.telemetry_url),
                internet_url: optional("INTERNET_CHECK_URL").unwrap_or(endpoint_defaults.internet_url),
                admin_port: parsed("ADMIN_PORT", endpoint_defaults.admin_port)?,
                minimum_version: optional("MINIMUM_VERSION")
                    .unwrap_or(endpoint_defaults.minimum_version),
                ..endpoint_defaults
            },
            polling: PollingConfig {
                quorum_wait_ceiling_secs: optional("QUORUM_WAIT_CEILING_SECS")
                    .map(|v| {
                        v.trim().parse().map_err(|_| {
                            ProvisionError::Config(format!(
                                "QUORUM_WAIT_CEILING_SECS must be a number, got {:?}",
                                v
                            ))
                        })
                    })
                    .transpose()?,
                ..polling_defaults
            },
            cli: CliConfig {
                admin_cli_path: optional("ADMIN_CLI_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(cli_defaults.admin_cli_path),
                work_dir: optional("WORK_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(cli_defaults.work_dir),
                ..cli_defaults
            },
            required_packages: list("REQUIRED_PACKAGES"),
            dev_environment: flag("DEV_ENVIRONMENT"),
            power_off_on_success: !flag("NO_POWER_OFF"),
            package_url: optional("PACKAGE_URL").unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: ProvisionerConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProvisionError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.deployment_unique_name.is_empty() {
            return Err(ProvisionError::Config(
                "deployment_unique_name must not be empty".into(),
            ));
        }
        if self.target.replace
            && self.target.existing_deployment.as_deref() == Some(self.deployment_unique_name.as_str())
        {
            return Err(ProvisionError::Config(
                "a deployment cannot replace itself".into(),
            ));
        }
        self.target.validate()
    }
}
