use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::domain::classifier::{ClassificationResult, ClassificationTask, Classifier};
use crate::domain::DomainError;

/// Layers of classifiers filtering the candidates by majority vote
///
/// A candidate survives a layer when at least half of its classifiers (rounded up) relate it.
/// Survivors of the last layer are related with full confidence.
#[derive(Debug, Clone)]
pub struct PipelineClassifier {
    layers: Vec<Vec<Arc<dyn Classifier>>>,
}

impl PipelineClassifier {
    pub fn new(layers: Vec<Vec<Arc<dyn Classifier>>>) -> Result<Self, DomainError> {
        if layers.is_empty() || layers.iter().any(Vec::is_empty) {
            return Err(DomainError::configuration(
                "A classifier pipeline needs at least one classifier per layer",
            ));
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> usize {
        self.layers.len()
    }
}

fn pair_key(task: &ClassificationTask) -> (String, String) {
    (
        task.source.identifier().to_string(),
        task.target.identifier().to_string(),
    )
}

async fn majority_vote(
    layer: &[Arc<dyn Classifier>],
    tasks: Vec<ClassificationTask>,
) -> Result<Vec<ClassificationTask>, DomainError> {
    let mut index = HashMap::new();
    let mut candidates = Vec::with_capacity(tasks.len());
    for task in tasks {
        if !index.contains_key(&pair_key(&task)) {
            index.insert(pair_key(&task), candidates.len());
            candidates.push(task);
        }
    }

    let layer_results = try_join_all(
        layer
            .iter()
            .map(|classifier| classifier.classify_tasks(candidates.clone())),
    )
    .await?;

    let mut votes = vec![0usize; candidates.len()];
    for results in layer_results {
        for result in results {
            let (source, target) = result.pair_ids();
            match index.get(&(source.to_string(), target.to_string())) {
                Some(&i) => votes[i] += 1,
                None => debug!(source, target, "Ignoring vote for a pair outside the candidates"),
            }
        }
    }

    let threshold = layer.len().div_ceil(2);
    Ok(candidates
        .into_iter()
        .zip(votes)
        .filter(|(_, count)| *count >= threshold)
        .map(|(task, _)| task)
        .collect())
}

#[async_trait]
impl Classifier for PipelineClassifier {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn threads(&self) -> usize {
        1
    }

    fn copy_of(&self) -> Result<Box<dyn Classifier>, DomainError> {
        Ok(Box::new(self.clone()))
    }

    async fn classify_pair(
        &self,
        _task: &ClassificationTask,
    ) -> Result<Option<ClassificationResult>, DomainError> {
        Err(DomainError::configuration(
            "Pipeline classifiers do not classify single pairs",
        ))
    }

    async fn classify_tasks(
        &self,
        tasks: Vec<ClassificationTask>,
    ) -> Result<Vec<ClassificationResult>, DomainError> {
        let mut remaining = tasks;

        for (layer_index, layer) in self.layers.iter().enumerate() {
            info!(
                layer = layer_index,
                classifiers = layer.len(),
                tasks = remaining.len(),
                "Invoking classifier layer"
            );
            let before = remaining.len();
            remaining = majority_vote(layer, remaining).await?;
            info!(layer = layer_index, before, after = remaining.len(), "Reduced candidates");

            if remaining.is_empty() {
                info!(layer = layer_index, "No candidates left, stopping classification");
                break;
            }
        }

        Ok(remaining.iter().map(ClassificationResult::related).collect())
    }
}
