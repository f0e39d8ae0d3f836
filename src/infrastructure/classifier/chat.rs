//! Chat model access with response caching

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::domain::cache::{Cache, ClassifierCacheParameter};
use crate::domain::{DomainError, LlmProvider, LlmRequest, Message};

/// Builds a fresh chat backend; called once per classifier copy
pub type ChatBackendFactory =
    Arc<dyn Fn() -> Result<Arc<dyn LlmProvider>, DomainError> + Send + Sync>;

/// Chat backend whose answers are cached per rendered request
///
/// Copies get their own backend and share the cache.
#[derive(Clone)]
pub struct CachedChatModel {
    backend: Arc<dyn LlmProvider>,
    backend_factory: ChatBackendFactory,
    cache: Arc<dyn Cache>,
    parameter: ClassifierCacheParameter,
}

impl fmt::Debug for CachedChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedChatModel")
            .field("backend", &self.backend.provider_name())
            .field("parameter", &self.parameter)
            .finish()
    }
}

impl CachedChatModel {
    pub fn new(
        parameter: ClassifierCacheParameter,
        cache: Arc<dyn Cache>,
        backend_factory: ChatBackendFactory,
    ) -> Result<Self, DomainError> {
        let backend = backend_factory()?;
        Ok(Self {
            backend,
            backend_factory,
            cache,
            parameter,
        })
    }

    /// Same model and cache with a new backend client
    pub fn copy_of(&self) -> Result<Self, DomainError> {
        Ok(Self {
            backend: (self.backend_factory)()?,
            backend_factory: Arc::clone(&self.backend_factory),
            cache: Arc::clone(&self.cache),
            parameter: self.parameter.clone(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.parameter.model_name
    }

    pub fn parameter(&self) -> &ClassifierCacheParameter {
        &self.parameter
    }

    /// Answer to `messages`, cached under `cache_content`
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        cache_content: &str,
    ) -> Result<String, DomainError> {
        let key = self.parameter.create_cache_key(cache_content);
        if let Some(cached) = self.cache.get_raw(&key).await? {
            debug!(model = %self.parameter.model_name, "Using cached response");
            return Ok(cached);
        }

        let request = LlmRequest::builder()
            .messages(messages)
            .temperature(self.parameter.temperature)
            .seed(self.parameter.seed)
            .build();
        let response = self
            .backend
            .chat(&self.parameter.model_name, request)
            .await?;

        let content = response.content().to_string();
        self.cache.put_raw(&key, &content).await?;
        Ok(content)
    }
}
