use std::sync::Arc;
use std::time::Duration;

use super::http_client::HttpClient;
use super::platform::{Endpoint, Platform};
use super::OpenAiProvider;
use crate::domain::{DomainError, LlmProvider};

/// Request timeout of self-hosted platforms
const SELF_HOSTED_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Factory for chat backends
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a fresh chat backend for a platform from the process environment
    ///
    /// Every call builds its own HTTP client, so parallel workers never share one.
    pub fn create(platform: Platform) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let endpoint = platform.chat_endpoint()?;
        Self::create_with_endpoint(platform, endpoint)
    }

    /// Create a chat backend for a platform with an explicit endpoint
    pub fn create_with_endpoint(
        platform: Platform,
        endpoint: Endpoint,
    ) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let http_client = match platform {
            Platform::Ollama | Platform::OpenWebUi => HttpClient::with_timeout(SELF_HOSTED_TIMEOUT)?,
            Platform::OpenAi | Platform::Blablador | Platform::DeepSeek => HttpClient::new(),
        };

        Ok(Arc::new(OpenAiProvider::with_name(
            http_client,
            endpoint,
            provider_name(platform),
        )))
    }
}

/// Static name reported by the backend of a platform
pub(crate) fn provider_name(platform: Platform) -> &'static str {
    match platform {
        Platform::OpenAi => "openai",
        Platform::Ollama => "ollama",
        Platform::Blablador => "blablador",
        Platform::DeepSeek => "deepseek",
        Platform::OpenWebUi => "openwebui",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_with_endpoint() {
        for platform in [
            Platform::OpenAi,
            Platform::Ollama,
            Platform::Blablador,
            Platform::DeepSeek,
            Platform::OpenWebUi,
        ] {
            let provider =
                LlmProviderFactory::create_with_endpoint(platform, Endpoint::new("http://localhost"))
                    .unwrap();
            assert_eq!(provider.provider_name(), platform.to_string());
        }
    }
}
