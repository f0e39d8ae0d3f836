//! Classifier registry: `<kind>_<platform>` names resolved into configured classifiers

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use super::chat::{CachedChatModel, ChatBackendFactory};
use super::reasoning::resolve_reasoning_prompt;
use super::{MockClassifier, PipelineClassifier, ReasoningClassifier, SimpleClassifier};
use crate::domain::cache::{CacheParameter, ClassifierCacheParameter};
use crate::domain::classifier::Classifier;
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheManager;
use crate::infrastructure::llm::{Endpoint, LlmProviderFactory, Platform};

/// Seed sent with every chat request unless configured otherwise
pub const DEFAULT_SEED: i64 = 133742243;

pub const DEFAULT_TEMPERATURE: f64 = 0.0;

/// Supported classifier kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Mock,
    Simple,
    Reasoning,
}

impl ClassifierKind {
    /// Cache namespace origin, shared with earlier cache files
    fn origin(&self) -> &'static str {
        match self {
            ClassifierKind::Mock => "MockClassifier",
            ClassifierKind::Simple => "SimpleClassifier",
            ClassifierKind::Reasoning => "ReasoningClassifier",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierKind::Mock => write!(f, "mock"),
            ClassifierKind::Simple => write!(f, "simple"),
            ClassifierKind::Reasoning => write!(f, "reasoning"),
        }
    }
}

impl FromStr for ClassifierKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mock" => Ok(ClassifierKind::Mock),
            "simple" => Ok(ClassifierKind::Simple),
            "reasoning" => Ok(ClassifierKind::Reasoning),
            _ => Err(DomainError::configuration(format!(
                "Unknown classifier: {}. Valid classifiers: mock, simple, reasoning",
                s
            ))),
        }
    }
}

fn default_name() -> String {
    "mock".to_string()
}

fn default_seed() -> i64 {
    DEFAULT_SEED
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_use_system_message() -> bool {
    true
}

/// Configuration of one classifier
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// `mock` or `<kind>_<platform>`, e.g. `simple_openai`
    #[serde(default = "default_name")]
    pub name: String,
    /// Chat model, the platform default when unset
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_seed")]
    pub seed: i64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Worker count, the platform default when unset
    #[serde(default)]
    pub threads: Option<usize>,
    /// Prompt template of simple classifiers
    #[serde(default)]
    pub template: Option<String>,
    /// Prompt index or text of reasoning classifiers
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub use_original_artifacts: bool,
    #[serde(default = "default_use_system_message")]
    pub use_system_message: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            model: None,
            seed: DEFAULT_SEED,
            temperature: DEFAULT_TEMPERATURE,
            threads: None,
            template: None,
            prompt: None,
            use_original_artifacts: false,
            use_system_message: true,
        }
    }
}

impl ClassifierConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Splits the name into kind and platform
    pub fn kind(&self) -> Result<(ClassifierKind, Option<Platform>), DomainError> {
        match self.name.split_once('_') {
            None => {
                let kind: ClassifierKind = self.name.parse()?;
                if kind != ClassifierKind::Mock {
                    return Err(DomainError::configuration(format!(
                        "Classifier '{}' needs a platform, e.g. {}_openai",
                        self.name, kind
                    )));
                }
                Ok((kind, None))
            }
            Some((kind, platform)) => Ok((kind.parse()?, Some(platform.parse()?))),
        }
    }
}

fn missing_platform(config: &ClassifierConfig) -> DomainError {
    DomainError::configuration(format!("Classifier '{}' needs a platform", config.name))
}

/// Builds the classifier named in the configuration
pub fn create_classifier(
    config: &ClassifierConfig,
    cache_manager: &CacheManager,
) -> Result<Arc<dyn Classifier>, DomainError> {
    match config.kind()? {
        (ClassifierKind::Mock, _) => Ok(Arc::new(MockClassifier)),
        (_, Some(platform)) => {
            let endpoint = platform.chat_endpoint()?;
            create_classifier_with_endpoint(config, endpoint, cache_manager)
        }
        (_, None) => Err(missing_platform(config)),
    }
}

/// Builds a classifier whose platform is reachable at `endpoint`
pub fn create_classifier_with_endpoint(
    config: &ClassifierConfig,
    endpoint: Endpoint,
    cache_manager: &CacheManager,
) -> Result<Arc<dyn Classifier>, DomainError> {
    let (kind, platform) = match config.kind()? {
        (ClassifierKind::Mock, _) => return Ok(Arc::new(MockClassifier)),
        (_, None) => return Err(missing_platform(config)),
        (kind, Some(platform)) => (kind, platform),
    };

    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| platform.default_chat_model().to_string());
    let threads = config.threads.unwrap_or_else(|| platform.threads()).max(1);

    let parameter =
        ClassifierCacheParameter::new(model_name.clone(), config.seed, config.temperature);
    let cache = cache_manager.get_cache(kind.origin(), &CacheParameter::Classifier(parameter.clone()))?;
    let backend_factory: ChatBackendFactory =
        Arc::new(move || LlmProviderFactory::create_with_endpoint(platform, endpoint.clone()));
    let model = CachedChatModel::new(parameter, cache, backend_factory)?;

    info!(
        classifier = %config.name,
        model = %model_name,
        threads,
        "Creating classifier"
    );

    let classifier: Arc<dyn Classifier> = match kind {
        ClassifierKind::Mock => Arc::new(MockClassifier),
        ClassifierKind::Simple => {
            let classifier = SimpleClassifier::new(config.name.clone(), threads, model);
            match &config.template {
                Some(template) => Arc::new(classifier.with_template(template.clone())),
                None => Arc::new(classifier),
            }
        }
        ClassifierKind::Reasoning => Arc::new(
            ReasoningClassifier::new(config.name.clone(), threads, model)
                .with_prompt(resolve_reasoning_prompt(config.prompt.as_deref())?)
                .with_original_artifacts(config.use_original_artifacts)
                .with_system_message(config.use_system_message),
        ),
    };

    Ok(classifier)
}

/// Builds the classifier of a pipeline configuration
///
/// A single layer with a single classifier is returned as is.
pub fn create_pipeline_classifier(
    layers: &[Vec<ClassifierConfig>],
    cache_manager: &CacheManager,
) -> Result<Arc<dyn Classifier>, DomainError> {
    if let [layer] = layers {
        if let [config] = layer.as_slice() {
            return create_classifier(config, cache_manager);
        }
    }

    let layers = layers
        .iter()
        .map(|layer| {
            layer
                .iter()
                .map(|config| create_classifier(config, cache_manager))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Arc::new(PipelineClassifier::new(layers)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::ClassificationTask;
    use crate::domain::knowledge::Element;
    use crate::infrastructure::cache::CacheManagerConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(dir: &TempDir) -> CacheManager {
        CacheManager::with_remote(CacheManagerConfig::new(dir.path()), None).unwrap()
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(
            ClassifierConfig::new("mock").kind().unwrap(),
            (ClassifierKind::Mock, None)
        );
        assert_eq!(
            ClassifierConfig::new("simple_openai").kind().unwrap(),
            (ClassifierKind::Simple, Some(Platform::OpenAi))
        );
        assert_eq!(
            ClassifierConfig::new("reasoning_ollama").kind().unwrap(),
            (ClassifierKind::Reasoning, Some(Platform::Ollama))
        );
        assert!(ClassifierConfig::new("simple").kind().is_err());
        assert!(ClassifierConfig::new("fuzzy_openai").kind().is_err());
        assert!(ClassifierConfig::new("simple_gemini").kind().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{"name": "reasoning_openai"}"#).unwrap();

        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert!(config.use_system_message);
        assert!(!config.use_original_artifacts);
        assert!(config.threads.is_none());
    }

    #[test]
    fn test_platform_defaults_and_overrides() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let endpoint = Endpoint::new("http://localhost/v1");

        let openai =
            create_classifier_with_endpoint(&ClassifierConfig::new("simple_openai"), endpoint.clone(), &manager)
                .unwrap();
        let ollama = create_classifier_with_endpoint(
            &ClassifierConfig::new("simple_ollama").with_threads(4),
            endpoint,
            &manager,
        )
        .unwrap();

        assert_eq!(openai.threads(), 100);
        assert_eq!(openai.name(), "simple_openai");
        assert_eq!(ollama.threads(), 4);
    }

    #[test]
    fn test_invalid_prompt_index() {
        let dir = TempDir::new().unwrap();
        let result = create_classifier_with_endpoint(
            &ClassifierConfig::new("reasoning_openai").with_prompt("9"),
            Endpoint::new("http://localhost/v1"),
            &manager(&dir),
        );

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_single_classifier_pipeline_is_unwrapped() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let single = create_pipeline_classifier(&[vec![ClassifierConfig::new("mock")]], &manager).unwrap();
        let layered = create_pipeline_classifier(
            &[
                vec![ClassifierConfig::new("mock"), ClassifierConfig::new("mock")],
                vec![ClassifierConfig::new("mock")],
            ],
            &manager,
        )
        .unwrap();

        assert_eq!(single.name(), "mock");
        assert_eq!(layered.name(), "pipeline");
        assert!(create_pipeline_classifier(&[], &manager).is_err());
    }

    #[tokio::test]
    async fn test_reasoning_classifier_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "choices": [{"message": {"role": "assistant", "content": "Both log in. <trace>yes</trace>"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let classifier = create_classifier_with_endpoint(
            &ClassifierConfig::new("reasoning_openai"),
            Endpoint::new(format!("{}/v1", server.uri())),
            &manager,
        )
        .unwrap();
        let task = ClassificationTask::new(
            Arc::new(Element::new("R1", "requirement", "Users log in.", 0, None, true).unwrap()),
            Arc::new(Element::new("Login.java", "source code", "class Login {}", 0, None, true).unwrap()),
        );

        let first = classifier.classify_pair(&task).await.unwrap();
        let second = classifier.classify_pair(&task).await.unwrap();
        manager.flush().await.unwrap();

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(dir
            .path()
            .join("ReasoningClassifier_gpt-4o-mini_133742243.json")
            .exists());
    }
}
