//! Cluster provisioner - reconciles a storage cluster running on cloud VMs
//! with a declarative target configuration.
//!
//! Each run reads the persisted state of its deployment, probes the live
//! nodes, plans the lifecycle operations that close the gap (create, replace,
//! add or remove nodes, add buckets, raise capacity, floating IPs) and
//! executes them through the cluster's admin CLI.

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod storage;

// Re-export commonly used types
pub use error::{ErrorKind, ProvisionError, Result};
