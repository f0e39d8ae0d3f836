//! Parallel execution of classification tasks

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::{ClassificationResult, ClassificationTask, Classifier};
use crate::domain::DomainError;

/// Upper bound on one classification stage
pub const CLASSIFICATION_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Drains `tasks` with `threads` workers, each owning a copy of `classifier`
///
/// A failing worker fails the stage with its error. When `timeout` elapses the remaining
/// workers are cancelled and the results collected so far are returned.
pub async fn execute_tasks<C: Classifier + ?Sized>(
    classifier: &C,
    tasks: Vec<ClassificationTask>,
    threads: usize,
    timeout: Duration,
) -> Result<Vec<ClassificationResult>, DomainError> {
    let threads = threads.clamp(1, tasks.len().max(1));
    let total = tasks.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
    let results = Arc::new(Mutex::new(Vec::with_capacity(total)));

    let mut workers = JoinSet::new();
    for worker in 0..threads {
        let copy = classifier.copy_of()?;
        let queue = Arc::clone(&queue);
        let results = Arc::clone(&results);

        workers.spawn(async move {
            let mut classified = 0usize;
            loop {
                let next = queue
                    .lock()
                    .map_err(|_| DomainError::internal("Task queue lock poisoned"))?
                    .pop_front();
                let Some(task) = next else { break };

                if let Some(result) = copy.classify_pair(&task).await? {
                    results
                        .lock()
                        .map_err(|_| DomainError::internal("Result lock poisoned"))?
                        .push(result);
                }
                classified += 1;
            }
            debug!(worker, classified, "Classification worker finished");
            Ok::<(), DomainError>(())
        });
    }

    let outcome = tokio::time::timeout(timeout, async {
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(error = %e, "Classification worker failed");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "Classification worker panicked");
                    return Err(DomainError::internal(format!(
                        "Classification worker panicked: {}",
                        e
                    )));
                }
            }
        }
        Ok(())
    })
    .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            workers.abort_all();
            warn!(
                timeout_secs = timeout.as_secs(),
                "Classification timed out, returning partial results"
            );
        }
    }

    let collected = std::mem::take(
        &mut *results
            .lock()
            .map_err(|_| DomainError::internal("Result lock poisoned"))?,
    );
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::StubClassifier;
    use crate::domain::knowledge::Element;

    fn tasks(n: usize) -> Vec<ClassificationTask> {
        (0..n)
            .map(|i| {
                ClassificationTask::new(
                    Arc::new(Element::new(format!("s{}", i), "t", "s", 0, None, true).unwrap()),
                    Arc::new(Element::new("t", "t", "t", 0, None, true).unwrap()),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_tasks_are_classified_once() {
        let related: Vec<(String, String)> =
            (0..20).map(|i| (format!("s{}", i), "t".to_string())).collect();
        let related: Vec<(&str, &str)> = related
            .iter()
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();
        let classifier = StubClassifier::new(&related, 4);

        let results = execute_tasks(&classifier, tasks(20), 4, CLASSIFICATION_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(results.len(), 20);
        assert_eq!(classifier.calls(), 20);
    }

    #[tokio::test]
    async fn test_worker_error_fails_stage() {
        let classifier = StubClassifier::new(&[], 2).failing_on("s3");

        let result = execute_tasks(&classifier, tasks(6), 2, CLASSIFICATION_TIMEOUT).await;

        assert!(matches!(result, Err(DomainError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_results() {
        let classifier =
            StubClassifier::new(&[("s0", "t"), ("s1", "t")], 2).with_delay(Duration::from_secs(60));

        let results = execute_tasks(&classifier, tasks(4), 2, Duration::from_millis(50))
            .await
            .unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_threads_capped_by_tasks() {
        let classifier = StubClassifier::new(&[], 8);

        execute_tasks(&classifier, tasks(2), 8, CLASSIFICATION_TIMEOUT)
            .await
            .unwrap();

        assert_eq!(classifier.copies(), 2);
    }
}
