//! Storage cluster administrative interface

pub mod admin_cli;
pub mod client;
pub mod responses;

pub use admin_cli::{AdminCli, AdminCliConfig};
pub use client::{CreateClusterRequest, LogLevel, ManagementClient, RawMethod};
pub use responses::{NetworkConfig, NetworkStatus, NodeState, ParseError, VersionInfo};

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("failed to invoke admin CLI `{subcommand}`: {source}")]
    Invoke {
        subcommand: String,
        #[source]
        source: std::io::Error,
    },

    #[error("admin CLI `{subcommand}` timed out after {timeout:?}")]
    Timeout {
        subcommand: String,
        timeout: Duration,
    },

    #[error("admin CLI `{subcommand}` failed with status {status:?}: {stderr}")]
    CommandFailed {
        subcommand: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse output of `{subcommand}` {stdout:?}: {source}")]
    Parse {
        subcommand: String,
        stdout: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to download admin CLI from {host}: {message}")]
    Download { host: String, message: String },
}

pub type ManagementResult<T> = Result<T, ManagementError>;
