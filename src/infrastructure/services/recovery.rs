//! End-to-end trace link recovery

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::domain::aggregation::{ResultAggregator, ResultAggregatorConfig, TraceLinkIdPostprocessor};
use crate::domain::classifier::Classifier;
use crate::domain::element_store::{reduce_source_store, reduce_target_store, ElementStore};
use crate::domain::embedding::EmbeddingCreator;
use crate::domain::knowledge::{Element, TraceLink};
use crate::domain::retrieval::{create_retrieval_strategy, RetrievalStrategy, RetrievalStrategyConfig};
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheManager;
use crate::infrastructure::classifier::{create_pipeline_classifier, ClassifierConfig};
use crate::infrastructure::embedding::{create_embedding_creator, EmbeddingCreatorConfig};

/// Source store settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceStoreConfig {
    /// Keep only the first `limit` source elements
    pub limit: Option<usize>,
}

/// Target store settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetStoreConfig {
    pub retrieval: RetrievalStrategyConfig,
    /// Keep only targets retrieved for some compared source element
    pub reduce: bool,
}

fn default_classifier() -> Vec<Vec<ClassifierConfig>> {
    vec![vec![ClassifierConfig::default()]]
}

/// Components of a recovery run
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub embedding: EmbeddingCreatorConfig,
    #[serde(default)]
    pub source_store: SourceStoreConfig,
    #[serde(default)]
    pub target_store: TargetStoreConfig,
    /// Classifier layers; a single entry runs that classifier alone
    #[serde(default = "default_classifier")]
    pub classifier: Vec<Vec<ClassifierConfig>>,
    #[serde(default)]
    pub aggregator: ResultAggregatorConfig,
    #[serde(default)]
    pub postprocessor: TraceLinkIdPostprocessor,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingCreatorConfig::default(),
            source_store: SourceStoreConfig::default(),
            target_store: TargetStoreConfig::default(),
            classifier: default_classifier(),
            aggregator: ResultAggregatorConfig::default(),
            postprocessor: TraceLinkIdPostprocessor::default(),
        }
    }
}

/// Runs embedding, retrieval, classification and aggregation over two element collections
pub struct TraceLinkRecoveryService {
    cache_manager: Arc<CacheManager>,
    embedding_creator: Arc<dyn EmbeddingCreator>,
    retrieval_strategy: Arc<dyn RetrievalStrategy>,
    classifier: Arc<dyn Classifier>,
    aggregator: ResultAggregator,
    postprocessor: TraceLinkIdPostprocessor,
    source_limit: Option<usize>,
    reduce_targets: bool,
}

impl fmt::Debug for TraceLinkRecoveryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceLinkRecoveryService")
            .field("retrieval_strategy", &self.retrieval_strategy.name())
            .field("classifier", &self.classifier.name())
            .field("aggregator", &self.aggregator.kind())
            .field("postprocessor", &self.postprocessor)
            .finish()
    }
}

impl TraceLinkRecoveryService {
    pub fn new(
        cache_manager: Arc<CacheManager>,
        embedding_creator: Arc<dyn EmbeddingCreator>,
        retrieval_strategy: Arc<dyn RetrievalStrategy>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            cache_manager,
            embedding_creator,
            retrieval_strategy,
            classifier,
            aggregator: ResultAggregator::any_connection(),
            postprocessor: TraceLinkIdPostprocessor::Identity,
            source_limit: None,
            reduce_targets: false,
        }
    }

    /// Builds every component named in the configuration
    pub fn from_config(
        config: &PipelineConfig,
        cache_manager: Arc<CacheManager>,
    ) -> Result<Self, DomainError> {
        let embedding_creator = create_embedding_creator(&config.embedding, &cache_manager)?;
        let retrieval_strategy = create_retrieval_strategy(&config.target_store.retrieval)?;
        let classifier = create_pipeline_classifier(&config.classifier, &cache_manager)?;

        Ok(Self::new(cache_manager, embedding_creator, retrieval_strategy, classifier)
            .with_aggregator(ResultAggregator::new(&config.aggregator)?)
            .with_postprocessor(config.postprocessor)
            .with_source_limit(config.source_store.limit)
            .with_reduced_targets(config.target_store.reduce))
    }

    pub fn with_aggregator(mut self, aggregator: ResultAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_postprocessor(mut self, postprocessor: TraceLinkIdPostprocessor) -> Self {
        self.postprocessor = postprocessor;
        self
    }

    pub fn with_source_limit(mut self, limit: Option<usize>) -> Self {
        self.source_limit = limit;
        self
    }

    pub fn with_reduced_targets(mut self, enabled: bool) -> Self {
        self.reduce_targets = enabled;
        self
    }

    /// Recovers the trace links between `sources` and `targets`
    ///
    /// Caches are flushed even when a stage fails.
    pub async fn run(
        &self,
        sources: Vec<Arc<Element>>,
        targets: Vec<Arc<Element>>,
    ) -> Result<BTreeSet<TraceLink>, DomainError> {
        let result = self.recover(sources, targets).await;
        let flushed = self.cache_manager.flush().await;

        let links = result?;
        flushed?;
        Ok(links)
    }

    async fn recover(
        &self,
        sources: Vec<Arc<Element>>,
        targets: Vec<Arc<Element>>,
    ) -> Result<BTreeSet<TraceLink>, DomainError> {
        info!(sources = sources.len(), targets = targets.len(), "Calculating embeddings");
        let source_embeddings = self.embedding_creator.calculate_embeddings(&sources).await?;
        let target_embeddings = self.embedding_creator.calculate_embeddings(&targets).await?;

        info!("Building element stores");
        let mut source_store = ElementStore::source();
        source_store.setup(sources, source_embeddings)?;
        let mut target_store = ElementStore::target(Arc::clone(&self.retrieval_strategy));
        target_store.setup(targets, target_embeddings)?;

        if let Some(limit) = self.source_limit {
            source_store = reduce_source_store(&source_store, limit)?;
        }
        if self.reduce_targets {
            target_store = reduce_target_store(&target_store, &source_store)?;
            info!(targets = target_store.len(), "Reduced target store");
        }

        info!(classifier = %self.classifier.name(), "Classifying trace links");
        let results = self.classifier.classify(&source_store, &target_store).await?;

        let links = self.aggregator.aggregate(&results);
        let links = self.postprocessor.postprocess(links)?;
        info!(links = links.len(), "Recovered trace links");

        Ok(links)
    }
}
