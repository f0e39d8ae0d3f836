use async_trait::async_trait;
use std::fmt::Debug;

use super::{LlmRequest, LlmResponse};
use crate::domain::DomainError;

/// Raw chat model backend (OpenAI, Ollama, Blablador, ...)
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Send a chat completion request
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::llm::Message;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type Responder = Arc<dyn Fn(&LlmRequest) -> Result<String, String> + Send + Sync>;

    /// Scripted chat backend; clones share their call counter
    #[derive(Clone)]
    pub struct MockLlmProvider {
        name: &'static str,
        responder: Responder,
        calls: Arc<AtomicUsize>,
    }

    impl MockLlmProvider {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                responder: Arc::new(|_| Err("No mock response configured".to_string())),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn with_response(mut self, content: impl Into<String>) -> Self {
            let content = content.into();
            self.responder = Arc::new(move |_| Ok(content.clone()));
            self
        }

        /// Answers with a function of the request
        pub fn with_responder(
            mut self,
            responder: impl Fn(&LlmRequest) -> Result<String, String> + Send + Sync + 'static,
        ) -> Self {
            self.responder = Arc::new(responder);
            self
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            let error = error.into();
            self.responder = Arc::new(move |_| Err(error.clone()));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl fmt::Debug for MockLlmProvider {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("MockLlmProvider")
                .field("name", &self.name)
                .field("calls", &self.calls())
                .finish()
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let content = (self.responder)(&request)
                .map_err(|error| DomainError::provider(self.name, error))?;

            Ok(LlmResponse::new(
                format!("mock-{}", self.calls()),
                model.to_string(),
                Message::assistant(content),
            ))
        }

        fn provider_name(&self) -> &'static str {
            self.name
        }
    }
}
