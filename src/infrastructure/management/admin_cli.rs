//! Admin CLI driven as a child process.
//!
//! Every call is `<cli> --host <ip> <subcommand> ...`. Commands that mutate the
//! cluster get a longer timeout than queries.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use super::client::{CreateClusterRequest, ManagementClient, RawMethod};
use super::responses::{
    parse_membership, NetworkConfig, NetworkStatus, NodeState, ParseError, VersionInfo,
};
use super::{ManagementError, ManagementResult};
use crate::domain::Membership;
use crate::infrastructure::process::{self, CommandOutput, ProcessError};

#[derive(Debug, Clone)]
pub struct AdminCliConfig {
    /// Where the downloaded CLI binary lives
    pub cli_path: PathBuf,
    /// Scratch directory for network config files
    pub work_dir: PathBuf,
    pub query_timeout: Duration,
    pub mutation_timeout: Duration,
}

impl Default for AdminCliConfig {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("./qq"),
            work_dir: PathBuf::from("."),
            query_timeout: Duration::from_secs(30),
            mutation_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CommandKind {
    Query,
    Mutation,
}

pub struct AdminCli {
    config: AdminCliConfig,
    http: reqwest::Client,
}

impl AdminCli {
    pub fn new(config: AdminCliConfig) -> ManagementResult<Self> {
        // nodes serve self-signed certificates
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(config.mutation_timeout)
            .build()
            .map_err(|e| ManagementError::Download {
                host: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { config, http })
    }

    async fn invoke(
        &self,
        host: &str,
        subcommand: &str,
        args: &[String],
        stdin: Option<&str>,
        kind: CommandKind,
    ) -> ManagementResult<String> {
        let limit = match kind {
            CommandKind::Query => self.config.query_timeout,
            CommandKind::Mutation => self.config.mutation_timeout,
        };

        let mut argv = vec!["--host".to_string(), host.to_string(), subcommand.to_string()];
        argv.extend_from_slice(args);

        let output = process::run(&self.config.cli_path, &argv, stdin, limit)
            .await
            .map_err(|e| match e {
                ProcessError::Spawn { source, .. } => ManagementError::Invoke {
                    subcommand: subcommand.to_string(),
                    source,
                },
                ProcessError::Timeout { timeout, .. } => ManagementError::Timeout {
                    subcommand: subcommand.to_string(),
                    timeout,
                },
            })?;

        check_status(subcommand, output)
    }

    async fn query(&self, host: &str, subcommand: &str, args: &[String]) -> ManagementResult<String> {
        self.invoke(host, subcommand, args, None, CommandKind::Query).await
    }

    async fn mutate(&self, host: &str, subcommand: &str, args: &[String]) -> ManagementResult<String> {
        self.invoke(host, subcommand, args, None, CommandKind::Mutation).await
    }

    fn network_config_path(&self) -> PathBuf {
        self.config.work_dir.join("network_config.json")
    }
}

fn check_status(subcommand: &str, output: CommandOutput) -> ManagementResult<String> {
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(ManagementError::CommandFailed {
            subcommand: subcommand.to_string(),
            status: output.code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

fn parsed<T>(subcommand: &str, stdout: &str, result: Result<T, ParseError>) -> ManagementResult<T> {
    result.map_err(|source| ManagementError::Parse {
        subcommand: subcommand.to_string(),
        stdout: stdout.to_string(),
        source,
    })
}

fn io_error(subcommand: &str, source: std::io::Error) -> ManagementError {
    ManagementError::Invoke {
        subcommand: subcommand.to_string(),
        source,
    }
}

#[async_trait]
impl ManagementClient for AdminCli {
    async fn install(&self, host: &str) -> ManagementResult<()> {
        let url = format!("https://{}/static/qq", host);
        info!("⬇️ Downloading admin CLI from {}", url);

        let download_error = |message: String| ManagementError::Download {
            host: host.to_string(),
            message,
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        tokio::fs::write(&self.config.cli_path, &bytes)
            .await
            .map_err(|e| io_error("install", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.config.cli_path, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| io_error("install", e))?;
        }

        Ok(())
    }

    async fn node_state(&self, host: &str) -> ManagementResult<NodeState> {
        let stdout = self.query(host, "node_state_get", &[]).await?;
        parsed("node_state_get", &stdout, NodeState::parse(&stdout))
    }

    async fn version(&self, host: &str) -> ManagementResult<VersionInfo> {
        let stdout = self.query(host, "version", &[]).await?;
        parsed("version", &stdout, VersionInfo::parse(&stdout))
    }

    async fn login(&self, host: &str, password: &str) -> ManagementResult<()> {
        let args = ["-u", "admin", "-p", password].map(String::from);
        self.query(host, "login", &args).await?;
        Ok(())
    }

    async fn change_password(&self, host: &str, old: &str, new: &str) -> ManagementResult<()> {
        let args = ["-o", old, "-p", new].map(String::from);
        self.query(host, "change_password", &args).await?;
        Ok(())
    }

    async fn create_cluster(&self, host: &str, request: &CreateClusterRequest) -> ManagementResult<()> {
        let mut args = vec![
            "--cluster-name".to_string(),
            request.cluster_name.clone(),
            "--admin-password".to_string(),
            request.admin_password.clone(),
            "--accept-eula".to_string(),
            "--host-instance-id".to_string(),
            request.host_instance_id.clone(),
            "--product-type".to_string(),
            request.product_type.clone(),
            "--object-storage-uris".to_string(),
        ];
        args.extend(request.object_storage_uris.iter().cloned());
        args.push("--node-ips-and-fault-domains".to_string());
        args.extend(request.node_ips_and_fault_domains.iter().cloned());
        args.push("--usable-capacity-clamp".to_string());
        args.push(request.usable_capacity_clamp.to_string());

        self.mutate(host, "create_object_backed_cluster", &args).await?;
        Ok(())
    }

    async fn modify_membership(&self, host: &str, node_ips_and_fault_domains: &[String]) -> ManagementResult<()> {
        let mut args = vec!["--node-ips-and-fault-domains".to_string()];
        args.extend(node_ips_and_fault_domains.iter().cloned());
        args.push("--batch".to_string());
        self.mutate(host, "modify_object_backed_cluster_membership", &args)
            .await?;
        Ok(())
    }

    async fn add_object_storage_uris(&self, host: &str, uris: &[String]) -> ManagementResult<()> {
        let mut args = vec!["--uris".to_string()];
        args.extend(uris.iter().cloned());
        self.mutate(host, "add_object_storage_uris", &args).await?;
        Ok(())
    }

    async fn set_capacity_clamp(&self, host: &str, clamp: u64) -> ManagementResult<()> {
        let args = vec!["--clamp".to_string(), clamp.to_string()];
        self.mutate(host, "capacity_clamp_set", &args).await?;
        Ok(())
    }

    async fn quorum_details(&self, host: &str) -> ManagementResult<Membership> {
        let stdout = self
            .raw(host, RawMethod::Get, "/v1/debug/quorum/details", None)
            .await?;
        parsed("raw GET /v1/debug/quorum/details", &stdout, parse_membership(&stdout))
    }

    async fn network_config(&self, host: &str) -> ManagementResult<NetworkConfig> {
        let path = self.network_config_path();
        let args = vec!["-o".to_string(), path.display().to_string()];
        self.query(host, "network_v3_get_config", &args).await?;

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| io_error("network_v3_get_config", e))?;
        let config = serde_json::from_str(&contents).map_err(ParseError::from);
        parsed("network_v3_get_config", &contents, config)
    }

    async fn put_network_config(&self, host: &str, config: &NetworkConfig) -> ManagementResult<()> {
        let path = self.network_config_path();
        let contents = serde_json::to_string(config).map_err(|e| ManagementError::Parse {
            subcommand: "network_v3_put_config".to_string(),
            stdout: String::new(),
            source: ParseError::from(e),
        })?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| io_error("network_v3_put_config", e))?;

        let args = vec!["--file".to_string(), path.display().to_string()];
        self.mutate(host, "network_v3_put_config", &args).await?;
        Ok(())
    }

    async fn network_status(&self, host: &str) -> ManagementResult<NetworkStatus> {
        let raw = self.query(host, "network_v3_status", &[]).await?;
        Ok(NetworkStatus { raw })
    }

    async fn set_monitoring(&self, host: &str, mq_host: &str, nexus_host: &str) -> ManagementResult<()> {
        let args = ["--mq-host", mq_host, "--nexus-host", nexus_host].map(String::from);
        self.query(host, "set_monitoring_conf", &args).await?;
        Ok(())
    }

    async fn raw(
        &self,
        host: &str,
        method: RawMethod,
        path: &str,
        body: Option<&str>,
    ) -> ManagementResult<String> {
        debug!(host, method = method.as_str(), path, "Raw admin request");
        let args = vec![method.as_str().to_string(), path.to_string()];
        let kind = match method {
            RawMethod::Get => CommandKind::Query,
            RawMethod::Put | RawMethod::Post => CommandKind::Mutation,
        };
        self.invoke(host, "raw", &args, body, kind).await
    }
}
