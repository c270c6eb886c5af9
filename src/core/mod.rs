//! Provisioning logic: quorum observation, planning, execution and the
//! controller that sequences them.

pub mod cluster;
pub mod logging;

pub use cluster::{
    OperationExecutor, OperationPlan, ProvisioningController, QuorumWatcher, StateReconciler,
};
