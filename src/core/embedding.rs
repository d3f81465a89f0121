use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::providers::openai::OPENAI_API_BASE;
use crate::providers::truncate;

/// Turns text into a vector for the vector store
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// OpenAI embeddings endpoint
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?,
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| OPENAI_API_BASE.to_string()),
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .context("Failed to send request to embeddings API")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read embeddings API response body")?;

        if !status.is_success() {
            bail!(
                "Embeddings API returned HTTP {}: {}",
                status,
                truncate(&body, 500)
            );
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&body).with_context(|| {
            format!(
                "Failed to parse embeddings API response: {}",
                truncate(&body, 200)
            )
        })?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("Embeddings API returned no data")?;

        debug!(dimensions = embedding.len(), chars = text.len(), "embedded text");
        Ok(embedding)
    }
}
