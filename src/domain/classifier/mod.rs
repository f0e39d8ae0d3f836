//! Classification of candidate pairs into trace link candidates

mod base;
mod executor;
mod result;

pub use base::{create_classification_tasks, Classifier};
pub use executor::{execute_tasks, CLASSIFICATION_TIMEOUT};
pub use result::{ClassificationResult, ClassificationTask};

#[cfg(test)]
pub use base::mock::StubClassifier;
