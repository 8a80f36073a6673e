pub mod hashing;
pub mod openai;

use crate::config::EmbeddingsConfig;
use crate::error::{FileragError, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub use hashing::HashEmbedder;
pub use openai::OpenAIEmbedder;

/// Maps text to fixed-dimension vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (used to scope caches)
    fn model(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(FileragError::Embedding("Empty embedding response".to_string()));
        }
        Ok(vectors.remove(0))
    }
}

/// Build the embedder selected by `embeddings.provider`.
pub fn build_embedder(config: &EmbeddingsConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.dimensions))),
        "openai" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                FileragError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                    config.api_key_env
                ))
            })?;
            let cache = if config.cache_capacity > 0 {
                Some(Arc::new(crate::cache::EmbeddingCache::new(config.cache_capacity)))
            } else {
                None
            };
            Ok(Arc::new(OpenAIEmbedder::new_with_cache(
                api_key,
                config.base_url.clone(),
                config.model.clone(),
                config.batch_size,
                cache,
            )?))
        }
        other => Err(FileragError::Config(format!("Unknown embeddings provider: {}", other))),
    }
}
