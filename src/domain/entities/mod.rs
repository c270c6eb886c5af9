pub mod cluster;

pub use cluster::{
    ClusterRecord, ClusterTarget, Membership, NodeProbe, QuorumSurvey, StorageClass,
};
