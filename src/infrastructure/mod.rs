pub mod cloud;
pub mod management;
pub mod packages;
pub mod probe;
pub mod process;
