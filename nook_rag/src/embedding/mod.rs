//! Provider-agnostic embedding client (spec.md §4.4).

mod ollama;
mod openai_compat;

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;

use nook_core::config::{EmbeddingConfig, EmbeddingProviderKind};

use crate::error::{RagError, Result};

pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;

/// Capability set every provider implements (spec.md §4.4, §9 "Polymorphic
/// embedding client").
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Default: fan out sequentially (Ollama has no native batch
    /// endpoint). OpenAI-compatible overrides this with one request.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    async fn list_models(&self) -> Result<Vec<String>>;

    fn provider(&self) -> EmbeddingProviderKind;
    fn base_url(&self) -> &str;
    fn model(&self) -> &str;

    /// Probe the model's dimensionality by embedding a short sample,
    /// cached per `(provider, base_url, model)` for the process lifetime.
    async fn dimension(&self) -> Result<usize> {
        let key = cache_key(self.provider(), self.base_url(), self.model());
        if let Some(d) = dimension_cache().lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&key) {
            return Ok(*d);
        }
        let sample = self.embed("dimension probe").await?;
        let d = sample.len();
        dimension_cache()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, d);
        Ok(d)
    }

    async fn test_connection(&self) -> Result<usize> {
        self.dimension().await
    }
}

type CacheKey = (u8, String, String);

fn cache_key(provider: EmbeddingProviderKind, base_url: &str, model: &str) -> CacheKey {
    let tag = match provider {
        EmbeddingProviderKind::Ollama => 0,
        EmbeddingProviderKind::OpenAiCompatible => 1,
    };
    (tag, base_url.to_string(), model.to_string())
}

fn dimension_cache() -> &'static Mutex<HashMap<CacheKey, usize>> {
    static CACHE: OnceLock<Mutex<HashMap<CacheKey, usize>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Build the configured client (spec.md §9: concrete implementations
/// selected at construction from `EmbeddingConfig`).
pub fn client_for(config: &EmbeddingConfig) -> Box<dyn EmbeddingClient> {
    match config.provider {
        EmbeddingProviderKind::Ollama => Box::new(OllamaClient::new(config.base_url.clone(), config.model.clone())),
        EmbeddingProviderKind::OpenAiCompatible => Box::new(OpenAiCompatClient::new(
            config.base_url.clone(),
            config.model.clone(),
            config.api_key.clone(),
        )),
    }
}

/// Capped exponential backoff the Indexer wraps around `embed_batch`
/// (spec.md §4.4: "retryable with capped exponential backoff (≤3
/// attempts)").
pub async fn embed_batch_with_retry(
    client: &dyn EmbeddingClient,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    const MAX_ATTEMPTS: u32 = 3;
    let mut attempt = 0;
    loop {
        match client.embed_batch(texts).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt));
                tracing::warn!(attempt, error = %e, "embedding call failed, retrying");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
