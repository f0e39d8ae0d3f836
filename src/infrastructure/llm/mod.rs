//! Chat backend implementations

mod factory;
mod http_client;
mod openai;
mod platform;

pub use factory::LlmProviderFactory;
pub(crate) use factory::provider_name;
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiProvider;
pub use platform::{Endpoint, Platform};

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
