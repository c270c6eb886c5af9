use crate::infrastructure::cloud::CloudError;
use crate::infrastructure::management::ManagementError;
use crate::storage::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connectivity check failed: {0}")]
    Connectivity(String),

    #[error("Cluster state inconsistency: {0}")]
    StateInconsistency(String),

    #[error("{0}")]
    VersionMismatch(String),

    #[error(
        "Cluster software version >= {minimum} is required (found {found}). \
         If this is a new deployment destroy it and redeploy with >= {minimum}."
    )]
    UnsupportedVersion { found: String, minimum: String },

    #[error("Bucket {0} NOT EMPTY. Empty bucket(s) and restart provisioner.")]
    BucketNotEmpty(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Package installation failed: {0}")]
    PackageInstall(String),

    #[error(transparent)]
    Management(#[from] ManagementError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a failure, used for log fields and exit reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A command or collaborator call failed
    CommandFailure,
    /// A required endpoint was unreachable before any mutation
    Connectivity,
    /// Partial quorum, unconfirmed removal or missing persisted state
    StateInconsistency,
    /// Version gate or mixed-version node addition
    Compatibility,
    /// A data-loss guard refused to proceed
    SafetyPrecondition,
    /// The target configuration could not be loaded or is invalid
    Configuration,
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::Config(_) => ErrorKind::Configuration,
            ProvisionError::Connectivity(_) => ErrorKind::Connectivity,
            ProvisionError::StateInconsistency(_) | ProvisionError::Timeout(_) => {
                ErrorKind::StateInconsistency
            }
            ProvisionError::VersionMismatch(_) | ProvisionError::UnsupportedVersion { .. } => {
                ErrorKind::Compatibility
            }
            ProvisionError::BucketNotEmpty(_) => ErrorKind::SafetyPrecondition,
            ProvisionError::PackageInstall(_)
            | ProvisionError::Management(_)
            | ProvisionError::Cloud(_)
            | ProvisionError::Store(_)
            | ProvisionError::Io(_) => ErrorKind::CommandFailure,
        }
    }
}

impl From<serde_yaml::Error> for ProvisionError {
    fn from(err: serde_yaml::Error) -> Self {
        ProvisionError::Config(format!("YAML error: {}", err))
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Config(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
