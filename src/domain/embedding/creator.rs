use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::knowledge::Element;
use crate::domain::DomainError;

/// Turns elements into embedding vectors
#[async_trait]
pub trait EmbeddingCreator: Send + Sync + Debug {
    /// One vector per element, in input order
    async fn calculate_embeddings(
        &self,
        elements: &[Arc<Element>],
    ) -> Result<Vec<Vec<f32>>, DomainError>;

    async fn calculate_embedding(&self, element: &Arc<Element>) -> Result<Vec<f32>, DomainError> {
        self.calculate_embeddings(std::slice::from_ref(element))
            .await?
            .pop()
            .ok_or_else(|| DomainError::internal("Embedding creator returned no vector"))
    }
}
