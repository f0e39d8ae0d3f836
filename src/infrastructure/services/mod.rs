//! Infrastructure services

mod recovery;

pub use recovery::{PipelineConfig, SourceStoreConfig, TargetStoreConfig, TraceLinkRecoveryService};
