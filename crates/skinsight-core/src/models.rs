//! Seams for the external models: text → vector and prompt → text.
//!
//! Pipeline stages take `&dyn Embedder` / `&dyn ChatModel` so the Ollama client
//! can be swapped for a fake in tests.

use async_trait::async_trait;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError>;

    /// Embeds each text with one call per item, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Sends a prompt to a generative model and returns its raw text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("embedding model returned no vector")]
    EmptyEmbedding,
    #[error(transparent)]
    Ollama(#[from] crate::ollama::OllamaError),
    #[error("model unavailable: {0}")]
    Unavailable(String),
}
