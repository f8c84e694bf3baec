
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::ProviderError;
use crate::config::{ConfigError, ProviderConfig};
use crate::embeddings::{Embedder, EmbeddingError, normalize_input};
use crate::generation::{ChatMessage, ChatModel};

/// Client for an OpenAI-compatible `/embeddings` and `/chat/completions` API.
///
/// Calls are never retried; a failure is returned to the caller as-is.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: Url,
    embedding_model: String,
    chat_model: String,
    api_key: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

impl fmt::Debug for OpenAiClient {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url.as_str())
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_url = config.base_url()?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            chat_model: config.chat_model.clone(),
            api_key: api_key.into(),
            agent,
        })
    }

    /// Build a client using the API key from the environment variable named in `config`
    #[inline]
    pub fn from_env(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let api_key = config.api_key()?;
        Self::new(config, api_key)
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Verify the provider is reachable and the configured models exist
    #[inline]
    pub fn health_check(&self) -> Result<(), ProviderError> {
        let models = self.list_models()?;

        for model in [&self.embedding_model, &self.chat_model] {
            if !models.iter().any(|m| &m.id == model) {
                warn!(
                    "Model {} not listed by provider at {}",
                    model, self.base_url
                );
            }
        }

        info!(
            "Provider at {} reachable ({} models listed)",
            self.base_url,
            models.len()
        );
        Ok(())
    }

    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = self.endpoint("models")?;
        debug!("Fetching available models from {}", url);

        let response_text = self
            .agent
            .get(url.as_str())
            .header("Authorization", self.authorization())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())?;

        let models: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(models.data)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Transport(format!("Failed to build {path} URL: {e}")))
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String, ProviderError> {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body)
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to encode request: {e}")))?;

        self.agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", self.authorization())
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|error| {
                warn!("Request to {} failed: {}", url, error);
                ProviderError::from(error)
            })
    }

    fn request_embeddings(
        &self,
        input: EmbeddingInput,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input,
        };

        let response_text = self.post_json("embeddings", &request)?;
        let mut response: EmbeddingResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        if response.data.is_empty() {
            return Err(EmbeddingError::MissingVector);
        }
        if response.data.len() != expected {
            return Err(EmbeddingError::CountMismatch {
                expected,
                actual: response.data.len(),
            });
        }

        response.data.sort_by_key(|item| item.index);
        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|item| item.embedding).collect();
        if vectors.iter().any(Vec::is_empty) {
            return Err(EmbeddingError::MissingVector);
        }

        debug!(
            "Generated {} embeddings with {} dimensions",
            vectors.len(),
            vectors.first().map_or(0, Vec::len)
        );
        Ok(vectors)
    }

    fn request_completion(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
        };

        let response_text = self.post_json("chat/completions", &request)?;
        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("completion has no content".to_string()))
    }

    /// Run a blocking HTTP call on the blocking pool so the async caller only suspends
    async fn run_blocking<T, E, F>(&self, job: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<ProviderError> + Send + 'static,
    {
        let client = self.clone();
        tokio::task::spawn_blocking(move || job(&client))
            .await
            .map_err(|e| E::from(ProviderError::Cancelled(e.to_string())))?
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    #[inline]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let input = normalize_input(text)?;
        let mut vectors = self
            .run_blocking(move |client| {
                client.request_embeddings(EmbeddingInput::Single(input), 1)
            })
            .await?;
        vectors.pop().ok_or(EmbeddingError::MissingVector)
    }

    #[inline]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = texts
            .iter()
            .map(|text| normalize_input(text))
            .collect::<Result<Vec<_>, _>>()?;
        let expected = inputs.len();

        self.run_blocking(move |client| {
            client.request_embeddings(EmbeddingInput::Batch(inputs), expected)
        })
        .await
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    #[inline]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let messages = messages.to_vec();
        self.run_blocking(move |client| client.request_completion(&messages))
            .await
    }
}
