//! Aggregation of classification results into trace links and identifier post-processing

mod aggregator;
mod postprocessor;

pub use aggregator::{AggregatorKind, ResultAggregator, ResultAggregatorConfig};
pub use postprocessor::TraceLinkIdPostprocessor;
