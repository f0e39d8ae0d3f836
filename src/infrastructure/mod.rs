//! Infrastructure layer - Cache tiers, model backends and classifier implementations

pub mod cache;
pub mod classifier;
pub mod embedding;
pub mod llm;
pub mod logging;
pub mod services;
