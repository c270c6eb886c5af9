pub mod controller;
pub mod executor;
pub mod quorum_watcher;
pub mod reconciler;

pub use controller::ProvisioningController;
pub use executor::OperationExecutor;
pub use quorum_watcher::QuorumWatcher;
pub use reconciler::{OperationPlan, StateReconciler};
