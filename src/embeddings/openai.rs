use super::Embedder;
use crate::cache::EmbeddingCache;
use crate::error::{FileragError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// OpenAI caps the number of inputs per embeddings request
const MAX_BATCH_SIZE: usize = 2048;
/// Retries for query embeddings on 429 / 5xx
const QUERY_MAX_RETRIES: usize = 3;

/// Request structure for the embeddings API
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Response structure from the embeddings API
#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

/// Individual embedding data in API response
#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Failure of one HTTP round trip, keeping the status for retry decisions
struct RequestFailure {
    status: Option<StatusCode>,
    error: FileragError,
}

/// Embeddings client for any OpenAI-compatible `/embeddings` endpoint
///
/// Handles batch embedding generation with retry logic and rate limiting.
/// Query embeddings are optionally cached to avoid repeated API calls.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    batch_size: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    /// Create a new embedder without a query cache
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    /// * `batch_size` - Maximum number of texts per API request (capped at 2048)
    pub fn new(api_key: String, base_url: String, model: String, batch_size: usize) -> Result<Self> {
        Self::new_with_cache(api_key, base_url, model, batch_size, None)
    }

    /// Create a new embedder with an optional query-embedding cache
    pub fn new_with_cache(
        api_key: String,
        base_url: String,
        model: String,
        batch_size: usize,
        cache: Option<Arc<EmbeddingCache>>,
    ) -> Result<Self> {
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FileragError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            batch_size,
            cache,
        })
    }

    /// Single API request for one batch
    async fn request(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, RequestFailure> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RequestFailure {
                status: None,
                error: FileragError::Embedding(format!("Network error: {}", e)),
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(RequestFailure {
                status: Some(status),
                error: FileragError::Embedding(format!("Embeddings API error {}: {}", status, body)),
            });
        }

        let result: EmbeddingResponse = response.json().await.map_err(|e| RequestFailure {
            status: Some(status),
            error: FileragError::Embedding(format!("Failed to parse response: {}", e)),
        })?;

        if result.data.len() != texts.len() {
            return Err(RequestFailure {
                status: Some(status),
                error: FileragError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    result.data.len()
                )),
            });
        }

        Ok(result.data.into_iter().map(|d| d.embedding).collect())
    }

    /// One batch with exponential backoff on rate limits and server errors
    async fn request_with_retry(&self, texts: &[String], max_retries: usize) -> Result<Vec<Vec<f32>>> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.request(texts).await {
                Ok(vectors) => {
                    log::debug!("Embedding API call took {:?} (attempt {})", start.elapsed(), attempt + 1);
                    return Ok(vectors);
                }
                Err(failure) if attempt < max_retries && is_retryable(failure.status) => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, max_retries, failure.error);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }
}

fn is_retryable(status: Option<StatusCode>) -> bool {
    match status {
        Some(status) => status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
        None => false,
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.request_with_retry(chunk, QUERY_MAX_RETRIES).await?;
            all_embeddings.extend(embeddings);

            // Rate limiting: small delay between full batches
            if chunk.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&self.model, text) {
                log::debug!("Cache hit for query: {}", text);
                return Ok(cached);
            }
        }

        let mut vectors = self
            .request_with_retry(&[text.to_string()], QUERY_MAX_RETRIES)
            .await?;
        let embedding = vectors
            .pop()
            .ok_or_else(|| FileragError::Embedding("Empty response from embeddings API".to_string()))?;

        if let Some(cache) = &self.cache {
            cache.put(&self.model, text, embedding.clone());
        }

        Ok(embedding)
    }
}
