//! Ollama embedding provider (spec.md §6): `POST {baseUrl}/api/embeddings
//! {model, prompt}` → `{embedding}`; `GET {baseUrl}/api/tags` for models.
//!
//! Grounded field-for-field on the teacher's `OllamaProvider::get_embedding`
//! (`lumosai_core/src/llm/ollama.rs`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nook_core::config::EmbeddingProviderKind;

use super::EmbeddingClient;
use crate::error::{RagError, Result};

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = tokio::time::timeout(
            EMBED_TIMEOUT,
            self.client
                .post(format!("{}/api/embeddings", self.base_url))
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| RagError::Timeout(EMBED_TIMEOUT))?
        .map_err(|e| RagError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RagError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RagError::RateLimited);
        }
        if !status.is_success() {
            return Err(RagError::HttpStatus(status.as_u16()));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Decode(e.to_string()))?;
        Ok(parsed.embedding)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| RagError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RagError::HttpStatus(response.status().as_u16()));
        }
        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(|e| RagError::Decode(e.to_string()))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn provider(&self) -> EmbeddingProviderKind {
        EmbeddingProviderKind::Ollama
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn model(&self) -> &str {
        &self.model
    }
}
