//! Model hosting platforms and how to reach them

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::domain::DomainError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const BLABLADOR_BASE_URL: &str = "https://api.helmholtz-blablador.fz-juelich.de/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

/// Base URL and headers of an OpenAI-compatible HTTP API
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    headers: Vec<(String, String)>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("headers", &names)
            .finish()
    }
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_bearer(self, api_key: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", api_key))
    }

    pub fn with_basic_auth(self, user: &str, password: &str) -> Self {
        let credentials = STANDARD.encode(format!("{}:{}", user, password));
        self.with_header("Authorization", format!("Basic {}", credentials))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Configured headers plus the JSON content type
    pub fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        headers.push(("Content-Type", "application/json"));
        headers
    }
}

/// Platform hosting chat and embedding models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    OpenAi,
    Ollama,
    Blablador,
    DeepSeek,
    OpenWebUi,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::OpenAi => write!(f, "openai"),
            Platform::Ollama => write!(f, "ollama"),
            Platform::Blablador => write!(f, "blablador"),
            Platform::DeepSeek => write!(f, "deepseek"),
            Platform::OpenWebUi => write!(f, "openwebui"),
        }
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Platform::OpenAi),
            "ollama" => Ok(Platform::Ollama),
            "blablador" => Ok(Platform::Blablador),
            "deepseek" => Ok(Platform::DeepSeek),
            "openwebui" => Ok(Platform::OpenWebUi),
            _ => Err(DomainError::configuration(format!(
                "Unknown platform: {}. Valid platforms: openai, ollama, blablador, deepseek, openwebui",
                s
            ))),
        }
    }
}

fn required(env: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, DomainError> {
    env(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DomainError::configuration(format!("{} environment variable not set", name)))
}

fn with_optional_basic_auth(
    endpoint: Endpoint,
    env: &impl Fn(&str) -> Option<String>,
    user_var: &str,
    password_var: &str,
) -> Endpoint {
    match (env(user_var), env(password_var)) {
        (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
            endpoint.with_basic_auth(&user, &password)
        }
        _ => endpoint,
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Platform {
    /// Default number of concurrent classification workers
    pub fn threads(&self) -> usize {
        match self {
            Platform::OpenAi | Platform::Blablador => 100,
            Platform::Ollama | Platform::DeepSeek | Platform::OpenWebUi => 1,
        }
    }

    pub fn default_chat_model(&self) -> &'static str {
        match self {
            Platform::OpenAi => "gpt-4o-mini",
            Platform::Ollama | Platform::OpenWebUi => "llama3:8b",
            Platform::Blablador => "2 - Llama 3.3 70B instruct",
            Platform::DeepSeek => "deepseek-chat",
        }
    }

    /// Default embedding model, `None` if the platform serves no embeddings
    pub fn default_embedding_model(&self) -> Option<&'static str> {
        match self {
            Platform::OpenAi => Some("text-embedding-ada-002"),
            Platform::Ollama | Platform::OpenWebUi => Some("nomic-embed-text:v1.5"),
            Platform::Blablador | Platform::DeepSeek => None,
        }
    }

    /// Default number of concurrent embedding workers
    pub fn embedding_threads(&self) -> usize {
        match self {
            Platform::OpenAi => 40,
            _ => 1,
        }
    }

    /// Chat endpoint built from the process environment
    pub fn chat_endpoint(&self) -> Result<Endpoint, DomainError> {
        self.chat_endpoint_from(process_env)
    }

    pub fn chat_endpoint_from(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Endpoint, DomainError> {
        match self {
            Platform::OpenAi => openai_endpoint(&env),
            Platform::Ollama => {
                let host = required(&env, "OLLAMA_HOST")?;
                Ok(with_optional_basic_auth(
                    Endpoint::new(format!("{}/v1", host.trim_end_matches('/'))),
                    &env,
                    "OLLAMA_USER",
                    "OLLAMA_PASSWORD",
                ))
            }
            Platform::Blablador => {
                let api_key = required(&env, "BLABLADOR_API_KEY")?;
                Ok(Endpoint::new(BLABLADOR_BASE_URL).with_bearer(&api_key))
            }
            Platform::DeepSeek => {
                let api_key = required(&env, "DEEPSEEK_API_KEY")?;
                Ok(Endpoint::new(DEEPSEEK_BASE_URL).with_bearer(&api_key))
            }
            Platform::OpenWebUi => openwebui_endpoint(&env),
        }
    }

    /// Embedding endpoint built from the process environment
    pub fn embedding_endpoint(&self) -> Result<Endpoint, DomainError> {
        self.embedding_endpoint_from(process_env)
    }

    pub fn embedding_endpoint_from(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Endpoint, DomainError> {
        match self {
            Platform::OpenAi => openai_endpoint(&env),
            Platform::Ollama => {
                let host = required(&env, "OLLAMA_EMBEDDING_HOST")?;
                Ok(with_optional_basic_auth(
                    Endpoint::new(format!("{}/v1", host.trim_end_matches('/'))),
                    &env,
                    "OLLAMA_EMBEDDING_USER",
                    "OLLAMA_EMBEDDING_PASSWORD",
                ))
            }
            Platform::OpenWebUi => openwebui_endpoint(&env),
            Platform::Blablador | Platform::DeepSeek => Err(DomainError::configuration(format!(
                "Platform {} has no embedding backend",
                self
            ))),
        }
    }
}

fn openai_endpoint(env: &impl Fn(&str) -> Option<String>) -> Result<Endpoint, DomainError> {
    let api_key = required(env, "OPENAI_API_KEY")?;
    let organization = required(env, "OPENAI_ORGANIZATION_ID")?;

    Ok(Endpoint::new(OPENAI_BASE_URL)
        .with_bearer(&api_key)
        .with_header("OpenAI-Organization", organization))
}

fn openwebui_endpoint(env: &impl Fn(&str) -> Option<String>) -> Result<Endpoint, DomainError> {
    let url = required(env, "OPENWEBUI_URL")?;
    let api_key = required(env, "OPENWEBUI_API_KEY")?;

    Ok(Endpoint::new(url).with_bearer(&api_key))
}
