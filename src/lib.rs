//! PMP Trace Recovery
//!
//! Recovers trace links between software artifacts with:
//! - Embedding-based candidate retrieval
//! - LLM classifiers, optionally layered into a voting pipeline
//! - Parameter-scoped caching of every model call in local files and Redis

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
