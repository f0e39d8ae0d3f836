//! Classifier trait definition

use std::fmt::Debug;

use async_trait::async_trait;
use tracing::info;

use super::{execute_tasks, ClassificationResult, ClassificationTask, CLASSIFICATION_TIMEOUT};
use crate::domain::element_store::ElementStore;
use crate::domain::DomainError;

/// Decides for candidate pairs whether they are related
///
/// Parallel execution gives each worker its own copy from [`Classifier::copy_of`]; copies
/// share the response cache but not the chat client.
#[async_trait]
pub trait Classifier: Send + Sync + Debug {
    /// Configuration name, e.g. `simple_openai`
    fn name(&self) -> &str;

    /// Number of concurrent workers, 1 means sequential
    fn threads(&self) -> usize;

    /// A fresh instance with the same configuration and its own backend client
    fn copy_of(&self) -> Result<Box<dyn Classifier>, DomainError>;

    /// Classifies one pair, `None` if the pair is unrelated
    async fn classify_pair(
        &self,
        task: &ClassificationTask,
    ) -> Result<Option<ClassificationResult>, DomainError>;

    /// Classifies every retrieved candidate of the compared source elements
    async fn classify(
        &self,
        source_store: &ElementStore,
        target_store: &ElementStore,
    ) -> Result<Vec<ClassificationResult>, DomainError> {
        let tasks = create_classification_tasks(source_store, target_store)?;
        info!(classifier = %self.name(), tasks = tasks.len(), "Classifying candidate pairs");

        let results = self.classify_tasks(tasks).await?;
        info!(classifier = %self.name(), related = results.len(), "Classification finished");

        Ok(results)
    }

    /// Classifies the given pairs with up to [`Classifier::threads`] workers
    ///
    /// Result order only matches task order for sequential execution.
    async fn classify_tasks(
        &self,
        tasks: Vec<ClassificationTask>,
    ) -> Result<Vec<ClassificationResult>, DomainError> {
        if self.threads() <= 1 || tasks.len() <= 1 {
            let mut results = Vec::new();
            for task in &tasks {
                if let Some(result) = self.classify_pair(task).await? {
                    results.push(result);
                }
            }
            return Ok(results);
        }

        execute_tasks(self, tasks, self.threads(), CLASSIFICATION_TIMEOUT).await
    }
}

/// One task per compared source element and each of its retrieved targets
pub fn create_classification_tasks(
    source_store: &ElementStore,
    target_store: &ElementStore,
) -> Result<Vec<ClassificationTask>, DomainError> {
    let mut tasks = Vec::new();

    for source in source_store.get_all_elements(true)? {
        for target in target_store.find_similar(&source.candidate())? {
            tasks.push(ClassificationTask::new(source.element.clone(), target));
        }
    }

    Ok(tasks)
}
