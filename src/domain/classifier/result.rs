use std::sync::Arc;

use crate::domain::knowledge::Element;
use crate::domain::DomainError;

/// A candidate pair handed to a classifier
#[derive(Debug, Clone)]
pub struct ClassificationTask {
    pub source: Arc<Element>,
    pub target: Arc<Element>,
}

impl ClassificationTask {
    pub fn new(source: Arc<Element>, target: Arc<Element>) -> Self {
        Self { source, target }
    }
}

/// A pair a classifier considers related
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    source: Arc<Element>,
    target: Arc<Element>,
    confidence: f64,
}

impl ClassificationResult {
    pub fn new(
        source: Arc<Element>,
        target: Arc<Element>,
        confidence: f64,
    ) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(DomainError::validation(format!(
                "Confidence must be within [0, 1], got {}",
                confidence
            )));
        }

        Ok(Self {
            source,
            target,
            confidence,
        })
    }

    /// Result with full confidence
    pub fn related(task: &ClassificationTask) -> Self {
        Self {
            source: Arc::clone(&task.source),
            target: Arc::clone(&task.target),
            confidence: 1.0,
        }
    }

    pub fn source(&self) -> &Arc<Element> {
        &self.source
    }

    pub fn target(&self) -> &Arc<Element> {
        &self.target
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Identifiers of source and target
    pub fn pair_ids(&self) -> (&str, &str) {
        (self.source.identifier(), self.target.identifier())
    }
}
