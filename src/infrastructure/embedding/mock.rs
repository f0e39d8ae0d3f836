use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::embedding::EmbeddingCreator;
use crate::domain::knowledge::Element;
use crate::domain::DomainError;

/// Embedding creator for dry runs; every element gets the same zero vector
#[derive(Debug, Default, Clone, Copy)]
pub struct MockEmbeddingCreator;

#[async_trait]
impl EmbeddingCreator for MockEmbeddingCreator {
    async fn calculate_embeddings(
        &self,
        elements: &[Arc<Element>],
    ) -> Result<Vec<Vec<f32>>, DomainError> {
        Ok(vec![vec![0.0]; elements.len()])
    }
}
