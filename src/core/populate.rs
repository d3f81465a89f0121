use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::core::chunking::chunk_text;
use crate::core::embedding::Embedder;
use crate::core::vector_store::{VectorRecord, VectorStore};

/// Read a document as plain text. Only `.txt` and `.md` files are supported.
pub fn load_document(path: &Path) -> Result<String> {
    let source = path.to_string_lossy();
    if source.starts_with("http://") || source.starts_with("https://") {
        bail!("Unsupported source '{}': web pages are not supported", source);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document: {}", path.display())),
        "" => bail!(
            "Unsupported document '{}': no file extension (expected .txt or .md)",
            path.display()
        ),
        other => bail!(
            "Unsupported document type '.{}' for {} (expected .txt or .md)",
            other,
            path.display()
        ),
    }
}

/// Id prefix for a document's chunks: its file stem.
pub fn default_prefix(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "doc".to_string())
}

#[derive(Debug, Clone)]
pub struct PopulateOptions {
    pub prefix: String,
    pub chunk_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Default)]
pub struct PopulateSummary {
    pub chunks: usize,
    pub inserted: Vec<String>,
    /// (chunk id, error message)
    pub failed: Vec<(String, String)>,
}

/// Chunks a document, embeds each chunk and writes it to the vector store.
pub struct Populator {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Populator {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn populate(&self, path: &Path, options: &PopulateOptions) -> Result<PopulateSummary> {
        let text = load_document(path)?;
        let summary = self.populate_text(&text, options).await?;
        info!(
            source = %path.display(),
            inserted = summary.inserted.len(),
            failed = summary.failed.len(),
            "populated vector store"
        );
        Ok(summary)
    }

    /// Chunk and store already-loaded text. A chunk that fails to embed or upsert is
    /// logged and skipped; the rest are still written.
    pub async fn populate_text(&self, text: &str, options: &PopulateOptions) -> Result<PopulateSummary> {
        let chunks = chunk_text(text, options.chunk_size, options.overlap)?;
        let mut summary = PopulateSummary {
            chunks: chunks.len(),
            ..Default::default()
        };

        for (i, chunk) in chunks.iter().enumerate() {
            let id = format!("{}_{}", options.prefix, i);
            match self.upsert_chunk(&id, chunk).await {
                Ok(()) => {
                    debug!(id = %id, "inserted chunk");
                    summary.inserted.push(id);
                }
                Err(e) => {
                    warn!(id = %id, error = %format!("{:#}", e), "failed to insert chunk");
                    summary.failed.push((id, format!("{:#}", e)));
                }
            }
        }

        Ok(summary)
    }

    async fn upsert_chunk(&self, id: &str, chunk: &str) -> Result<()> {
        let values = self.embedder.embed(chunk).await?;
        self.store
            .upsert(vec![VectorRecord::chunk(id, values, chunk)])
            .await
    }
}
