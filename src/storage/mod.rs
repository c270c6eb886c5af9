pub mod adapters;
pub mod deployment;
pub mod encoding;
pub mod error;
pub mod status;
pub mod traits;

pub use adapters::*;
pub use deployment::DeploymentStore;
pub use error::*;
pub use status::StatusLog;
pub use traits::*;
