use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::core::embedding::Embedder;
use crate::core::vector_store::{VectorMatch, VectorStore};

/// Looks up the stored chunks closest to a question.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<VectorMatch>> {
        let vector = self.embedder.embed(question).await?;
        let matches = self.store.query(&vector, top_k).await?;
        debug!(
            top_k,
            found = matches.len(),
            best = matches.first().map(|m| m.score),
            "retrieved context"
        );
        Ok(matches)
    }

    /// Context string for a question; empty when nothing matches.
    pub async fn context_for(&self, question: &str, top_k: usize) -> Result<String> {
        let matches = self.retrieve(question, top_k).await?;
        Ok(join_context(&matches))
    }
}

/// The `content` of each match, best first, separated by blank lines.
pub fn join_context(matches: &[VectorMatch]) -> String {
    matches
        .iter()
        .filter_map(|m| m.content())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
