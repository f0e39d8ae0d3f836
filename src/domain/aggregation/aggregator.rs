use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::domain::classifier::ClassificationResult;
use crate::domain::knowledge::TraceLink;
use crate::domain::DomainError;

/// Supported aggregation policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorKind {
    /// Two artifacts are linked when any pair of their elements is related
    AnyConnection,
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregatorKind::AnyConnection => write!(f, "any_connection"),
        }
    }
}

impl FromStr for AggregatorKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any_connection" => Ok(AggregatorKind::AnyConnection),
            _ => Err(DomainError::configuration(format!(
                "Unknown result aggregator: {}. Valid aggregators: any_connection",
                s
            ))),
        }
    }
}

fn default_name() -> String {
    AggregatorKind::AnyConnection.to_string()
}

/// Configuration of the aggregation stage
#[derive(Debug, Clone, Deserialize)]
pub struct ResultAggregatorConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub source_granularity: u32,
    #[serde(default)]
    pub target_granularity: u32,
}

impl Default for ResultAggregatorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            source_granularity: 0,
            target_granularity: 0,
        }
    }
}

/// Lifts classification results to trace links between elements of a fixed granularity
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    kind: AggregatorKind,
    source_granularity: u32,
    target_granularity: u32,
}

impl ResultAggregator {
    pub fn new(config: &ResultAggregatorConfig) -> Result<Self, DomainError> {
        Ok(Self {
            kind: config.name.parse()?,
            source_granularity: config.source_granularity,
            target_granularity: config.target_granularity,
        })
    }

    pub fn any_connection() -> Self {
        Self {
            kind: AggregatorKind::AnyConnection,
            source_granularity: 0,
            target_granularity: 0,
        }
    }

    pub fn kind(&self) -> AggregatorKind {
        self.kind
    }

    pub fn aggregate(&self, results: &[ClassificationResult]) -> BTreeSet<TraceLink> {
        let mut links = BTreeSet::new();

        for result in results {
            let source = result.source().ancestor_at(self.source_granularity);
            let target = result.target().ancestor_at(self.target_granularity);

            match (source, target) {
                (Some(source), Some(target)) => {
                    links.insert(TraceLink::new(source.identifier(), target.identifier()));
                }
                _ => {
                    let (source_id, target_id) = result.pair_ids();
                    debug!(
                        source = source_id,
                        target = target_id,
                        "Dropping result above the requested granularity"
                    );
                }
            }
        }

        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::Element;
    use std::sync::Arc;

    fn result(source: &Arc<Element>, target: &Arc<Element>) -> ClassificationResult {
        ClassificationResult::new(Arc::clone(source), Arc::clone(target), 1.0).unwrap()
    }

    #[test]
    fn test_results_are_lifted_to_artifacts() {
        let req = Arc::new(Element::new("UC1.txt", "requirement", "Log in.", 0, None, false).unwrap());
        let sentence = Arc::new(Element::from_parent(&req, 0, "Users log in.", true).unwrap());
        let other = Arc::new(Element::from_parent(&req, 1, "Sessions expire.", true).unwrap());
        let code = Arc::new(Element::new("Login.java", "source code", "class Login {}", 0, None, true).unwrap());

        let links = ResultAggregator::any_connection()
            .aggregate(&[result(&sentence, &code), result(&other, &code)]);

        assert_eq!(
            links.into_iter().collect::<Vec<_>>(),
            vec![TraceLink::new("UC1.txt", "Login.java")]
        );
    }

    #[test]
    fn test_results_above_granularity_are_dropped() {
        let doc = Arc::new(Element::new("doc", "documentation", "Doc.", 0, None, true).unwrap());
        let section = Arc::new(Element::from_parent(&doc, 3, "Section.", true).unwrap());
        let code = Arc::new(Element::new("A.java", "source code", "class A {}", 0, None, true).unwrap());
        let aggregator = ResultAggregator::new(&ResultAggregatorConfig {
            source_granularity: 1,
            ..Default::default()
        })
        .unwrap();

        let links = aggregator.aggregate(&[result(&doc, &code), result(&section, &code)]);

        assert_eq!(
            links.into_iter().collect::<Vec<_>>(),
            vec![TraceLink::new("doc$3", "A.java")]
        );
    }

    #[test]
    fn test_unknown_aggregator() {
        let config = ResultAggregatorConfig {
            name: "all_connections".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            ResultAggregator::new(&config),
            Err(DomainError::Configuration { .. })
        ));
    }
}
