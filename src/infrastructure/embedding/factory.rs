use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use super::cached::{CachedEmbeddingCreator, EmbeddingBackendFactory, DEFAULT_MAX_TOKEN_LENGTH};
use super::{MockEmbeddingCreator, OpenAiEmbeddingProvider};
use crate::domain::embedding::{EmbeddingCreator, EmbeddingProvider};
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheManager;
use crate::infrastructure::llm::{provider_name, Endpoint, HttpClient, Platform};

const EMBEDDING_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

fn default_name() -> String {
    "openai".to_string()
}

fn default_max_token_length() -> usize {
    DEFAULT_MAX_TOKEN_LENGTH
}

/// Configuration of the embedding stage
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingCreatorConfig {
    /// `mock` or a platform name
    #[serde(default = "default_name")]
    pub name: String,
    /// Model, the platform default when unset
    #[serde(default)]
    pub model: Option<String>,
    /// Worker count, the platform default when unset
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default = "default_max_token_length")]
    pub max_token_length: usize,
}

impl Default for EmbeddingCreatorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            model: None,
            threads: None,
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }
}

impl EmbeddingCreatorConfig {
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
}

/// Cache namespace of a platform's embeddings, shared with earlier cache files
fn origin(platform: Platform) -> &'static str {
    match platform {
        Platform::Ollama => "OllamaEmbeddingCreator",
        Platform::OpenWebUi => "OpenWebUiEmbeddingCreator",
        _ => "OpenAiEmbeddingCreator",
    }
}

/// Builds the embedding creator named in the configuration
pub fn create_embedding_creator(
    config: &EmbeddingCreatorConfig,
    cache_manager: &CacheManager,
) -> Result<Arc<dyn EmbeddingCreator>, DomainError> {
    if config.name == "mock" {
        return Ok(Arc::new(MockEmbeddingCreator));
    }

    let platform: Platform = config.name.parse()?;
    let endpoint = platform.embedding_endpoint()?;
    let creator = create_cached_embedding_creator(platform, endpoint, config, cache_manager)?;

    Ok(Arc::new(creator))
}

/// Builds a cached creator for a platform reachable at `endpoint`
pub fn create_cached_embedding_creator(
    platform: Platform,
    endpoint: Endpoint,
    config: &EmbeddingCreatorConfig,
    cache_manager: &CacheManager,
) -> Result<CachedEmbeddingCreator, DomainError> {
    let model = match &config.model {
        Some(model) => model.clone(),
        None => platform
            .default_embedding_model()
            .ok_or_else(|| {
                DomainError::configuration(format!(
                    "Platform {} has no embedding backend",
                    platform
                ))
            })?
            .to_string(),
    };
    let threads = config.threads.unwrap_or_else(|| platform.embedding_threads());

    let backend_factory: EmbeddingBackendFactory = {
        let model = model.clone();
        Arc::new(move || {
            let client = HttpClient::with_timeout(EMBEDDING_REQUEST_TIMEOUT)?;
            Ok(Arc::new(OpenAiEmbeddingProvider::with_name(
                client,
                endpoint.clone(),
                model.clone(),
                provider_name(platform),
            )) as Arc<dyn EmbeddingProvider>)
        })
    };

    info!(platform = %platform, model = %model, threads, "Creating embedding creator");

    Ok(
        CachedEmbeddingCreator::new(origin(platform), model, cache_manager, backend_factory)?
            .with_threads(threads)
            .with_max_token_length(config.max_token_length),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::knowledge::Element;
    use crate::infrastructure::cache::CacheManagerConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(dir: &TempDir) -> CacheManager {
        CacheManager::with_remote(CacheManagerConfig::new(dir.path()), None).unwrap()
    }

    #[tokio::test]
    async fn test_mock_creator() {
        let dir = TempDir::new().unwrap();
        let creator =
            create_embedding_creator(&EmbeddingCreatorConfig::new("mock"), &manager(&dir)).unwrap();
        let element = Arc::new(Element::new("a", "t", "text", 0, None, true).unwrap());

        let vectors = creator.calculate_embeddings(&[element]).await.unwrap();

        assert_eq!(vectors, vec![vec![0.0]]);
    }

    #[test]
    fn test_unknown_creator() {
        let dir = TempDir::new().unwrap();
        let result = create_embedding_creator(&EmbeddingCreatorConfig::new("onnx"), &manager(&dir));

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn test_platform_without_embeddings() {
        let dir = TempDir::new().unwrap();
        let result = create_cached_embedding_creator(
            Platform::DeepSeek,
            Endpoint::new("http://localhost"),
            &EmbeddingCreatorConfig::new("deepseek"),
            &manager(&dir),
        );

        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_embeddings_are_fetched_once_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "nomic-embed-text:v1.5",
                "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let config = EmbeddingCreatorConfig::new("ollama");
        let creator = create_cached_embedding_creator(
            Platform::Ollama,
            Endpoint::new(format!("{}/v1", server.uri())),
            &config,
            &manager,
        )
        .unwrap();
        let element = Arc::new(Element::new("a", "t", "The system shall log.", 0, None, true).unwrap());

        let first = creator.calculate_embedding(&element).await.unwrap();
        let second = creator.calculate_embedding(&element).await.unwrap();
        manager.flush().await.unwrap();

        assert_eq!(first, vec![0.1, 0.2, 0.3]);
        assert_eq!(first, second);
        assert_eq!(creator.model(), "nomic-embed-text:v1.5");
        assert_eq!(creator.threads(), 1);
        assert!(dir
            .path()
            .join("OllamaEmbeddingCreator_nomic-embed-text__v1.5.json")
            .exists());
    }
}
