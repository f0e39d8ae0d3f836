use async_trait::async_trait;

use crate::domain::classifier::{ClassificationResult, ClassificationTask, Classifier};
use crate::domain::DomainError;

/// Relates every candidate pair; for dry runs of the pipeline
#[derive(Debug, Default, Clone, Copy)]
pub struct MockClassifier;

#[async_trait]
impl Classifier for MockClassifier {
    fn name(&self) -> &str {
        "mock"
    }

    fn threads(&self) -> usize {
        1
    }

    fn copy_of(&self) -> Result<Box<dyn Classifier>, DomainError> {
        Ok(Box::new(*self))
    }

    async fn classify_pair(
        &self,
        task: &ClassificationTask,
    ) -> Result<Option<ClassificationResult>, DomainError> {
        Ok(Some(ClassificationResult::related(task)))
    }
}
