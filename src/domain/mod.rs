//! Domain types shared by the reconciler, executor and storage layers

pub mod entities;
pub mod version;

pub use entities::*;
