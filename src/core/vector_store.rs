//! Vector store clients: Pinecone over REST, and a small JSON-file store for
//! running without a hosted index.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::providers::{JsonObject, truncate};

/// A vector with its id and metadata, as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: JsonObject,
}

impl VectorRecord {
    /// Record for a document chunk; the chunk text goes in `metadata.content`.
    pub fn chunk(id: impl Into<String>, values: Vec<f32>, content: &str) -> Self {
        let mut metadata = JsonObject::new();
        metadata.insert("content".to_string(), json!(content));
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }
}

/// A query hit, best first
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: JsonObject,
}

impl VectorMatch {
    pub fn content(&self) -> Option<&str> {
        self.metadata.get("content").and_then(|v| v.as_str())
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// The `top_k` records most similar to `vector`, ordered by descending score.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>>;
}

// ---------- Pinecone ----------

pub struct PineconeStore {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

impl PineconeStore {
    pub fn new(host: String, api_key: String, namespace: Option<String>) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build HTTP client")?,
            host: host.trim_end_matches('/').to_string(),
            api_key,
            namespace,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<String> {
        let url = format!("{}/{}", self.host, path);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Pinecone ({})", path))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Pinecone response body")?;

        if !status.is_success() {
            bail!("Pinecone returned HTTP {}: {}", status, truncate(&body, 500));
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let count = records.len();
        let mut body = json!({ "vectors": records });
        if let Some(ns) = &self.namespace {
            body["namespace"] = json!(ns);
        }
        self.post("vectors/upsert", body).await?;
        debug!(count, "upserted vectors to Pinecone");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(ns) = &self.namespace {
            body["namespace"] = json!(ns);
        }
        let text = self.post("query", body).await?;
        let response: QueryResponse = serde_json::from_str(&text).with_context(|| {
            format!("Failed to parse Pinecone query response: {}", truncate(&text, 200))
        })?;
        Ok(response.matches)
    }
}

// ---------- Local JSON store ----------

/// Brute-force cosine search over records held in memory, optionally saved to a JSON
/// file after every upsert.
pub struct LocalStore {
    path: Option<PathBuf>,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Open a store backed by `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let mut records = HashMap::new();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read vector store: {}", path.display()))?;
            let stored: Vec<VectorRecord> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse vector store: {}", path.display()))?;
            for record in stored {
                records.insert(record.id.clone(), record);
            }
            info!(count = records.len(), path = %path.display(), "loaded local vector store");
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            records: RwLock::new(records),
        })
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn persist(path: &Path, records: &HashMap<String, VectorRecord>) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create vector store dir: {}", parent.display())
            })?;
        }

        let mut sorted: Vec<&VectorRecord> = records.values().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let json = serde_json::to_string(&sorted).context("Failed to serialize vector store")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write vector store: {}", path.display()))
    }
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut stored = self.records.write().await;

        // Memory only changes once the file holds the same records
        let mut next = stored.clone();
        for record in records {
            next.insert(record.id.clone(), record);
        }
        if let Some(path) = &self.path {
            Self::persist(path, &next).await?;
        }
        *stored = next;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        let stored = self.records.read().await;

        let mut matches: Vec<VectorMatch> = stored
            .values()
            .map(|record| VectorMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: record.metadata.clone(),
            })
            .collect();

        // Best score first; ties broken by id so results are stable
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

/// Cosine similarity; 0.0 for vectors of different length or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
