//! OpenAI-compatible embedding provider (spec.md §6): `POST {baseUrl}/embeddings
//! {model, input}` with `Authorization: Bearer {apiKey}` → `{data:[{embedding}]}`;
//! `GET {baseUrl}/models`.
//!
//! Grounded on the teacher's `OpenAIEmbeddingProvider` (`lumosai_rag/src/embedding/openai.rs`):
//! same request/response shapes, same index-sorted batch reassembly.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nook_core::config::EmbeddingProviderKind;

use super::EmbeddingClient;
use crate::error::{RagError, Result};

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAiCompatClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiCompatClient {
    pub fn new(base_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            base_url,
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiCompatClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| RagError::Decode("no embedding returned from API".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let builder = self.client.post(format!("{}/embeddings", self.base_url)).json(&request);
        let response = tokio::time::timeout(EMBED_TIMEOUT, self.authed(builder).send())
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
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RagError::ModelNotFound(self.model.clone()));
        }
        if !status.is_success() {
            return Err(RagError::HttpStatus(status.as_u16()));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Decode(e.to_string()))?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let builder = self.client.get(format!("{}/models", self.base_url));
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| RagError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RagError::HttpStatus(response.status().as_u16()));
        }
        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|e| RagError::Decode(e.to_string()))?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }

    fn provider(&self) -> EmbeddingProviderKind {
        EmbeddingProviderKind::OpenAiCompatible
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn model(&self) -> &str {
        &self.model
    }
}
