//! Ollama client for embeddings and generation. Wraps ollama-rs behind the model traits.

use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::Ollama;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::models::{ChatModel, Embedder, ModelError};

pub const DEFAULT_EMBED_MODEL: &str = "mxbai-embed-large";
pub const DEFAULT_CHAT_MODEL: &str = "llama2:7b";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    chat_model: String,
}

impl OllamaClient {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, OllamaError> {
        let inner = Ollama::try_new(url).map_err(OllamaError::ParseUrl)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
        })
    }

    /// Build from the loaded config: URL plus both model names.
    pub fn from_config(config: &Config) -> Result<Self, OllamaError> {
        Ok(Self::from_url(&config.ollama_url)?
            .with_embed_model(config.embed_model.clone())
            .with_chat_model(config.chat_model.clone()))
    }

    /// Set the embedding model (e.g. `mxbai-embed-large`, `nomic-embed-text`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the generation model (e.g. `llama2:7b`).
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Single(text.to_string()),
        );
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(OllamaError::Request)?;
        res.embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(ModelError::EmptyEmbedding)
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        debug!(model = %self.chat_model, prompt_chars = prompt.len(), "generate");
        let req = GenerationRequest::new(self.chat_model.clone(), prompt.to_string());
        let res = self
            .inner
            .generate(req)
            .await
            .map_err(OllamaError::Request)?;
        Ok(res.response)
    }
}

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("invalid Ollama URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("Ollama request failed: {0}")]
    Request(#[from] ollama_rs::error::OllamaError),
}
