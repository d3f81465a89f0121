//! Builds the assistant's collaborators from abaribot.toml.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::assistant::Assistant;
use crate::core::config::{AbariConfig, require_secret, resolve_secret};
use crate::core::embedding::{Embedder, OpenAiEmbedder};
use crate::core::fallback::FallbackClient;
use crate::core::interaction_log::{InteractionLog, JsonlLog, SupabaseLog};
use crate::core::retrieval::Retriever;
use crate::core::vector_store::{LocalStore, PineconeStore, VectorStore};

/// Load the nearest abaribot.toml (or defaults) relative to the working directory.
pub fn load_project() -> Result<(AbariConfig, PathBuf)> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    AbariConfig::load_or_default(&cwd)
}

pub fn build_embedder(config: &AbariConfig) -> Result<Arc<dyn Embedder>> {
    let api_key = require_secret(&config.embedding.key_env)?;
    let embedder = OpenAiEmbedder::new(
        api_key,
        config.embedding.model.clone(),
        config.embedding.base_url.clone(),
    )?;
    Ok(Arc::new(embedder))
}

pub fn build_store(config: &AbariConfig, root: &Path) -> Result<Arc<dyn VectorStore>> {
    let store = &config.vector_store;
    match store.backend.as_str() {
        "pinecone" => {
            let host = store
                .index_host
                .clone()
                .context("The pinecone vector store needs `index_host` in [vector_store]")?;
            let api_key = require_secret(&store.key_env)?;
            Ok(Arc::new(PineconeStore::new(host, api_key, store.namespace.clone())?))
        }
        _ => {
            let path = AbariConfig::resolve_path(root, &store.path);
            debug!(path = %path.display(), "using local vector store");
            Ok(Arc::new(LocalStore::open(&path)?))
        }
    }
}

pub fn build_log(config: &AbariConfig, root: &Path) -> Result<Option<Box<dyn InteractionLog>>> {
    let log = &config.interaction_log;
    match log.backend.as_str() {
        "none" => Ok(None),
        "supabase" => {
            let url = require_secret(&log.url_env)?;
            let key = require_secret(&log.key_env)?;
            Ok(Some(Box::new(SupabaseLog::new(url, key, log.table.clone())?)))
        }
        _ => {
            let path = AbariConfig::resolve_path(root, &log.path);
            Ok(Some(Box::new(JsonlLog::new(path))))
        }
    }
}

/// Wire up a session: the fallback chain, and retrieval unless `use_context` is off
/// or no embedding key is available.
pub fn build_assistant(config: &AbariConfig, root: &Path, use_context: bool) -> Result<Assistant> {
    let client = FallbackClient::from_settings(config.fallback_settings())
        .context("Failed to set up LLM providers")?;
    debug!(order = ?client.order(), "provider chain ready");

    let mut assistant = Assistant::new(client)
        .with_temperature(config.assistant.temperature)
        .with_top_k(config.assistant.top_k);

    if use_context {
        if resolve_secret(&config.embedding.key_env).is_some() {
            let retriever = Retriever::new(build_embedder(config)?, build_store(config, root)?);
            assistant = assistant.with_retriever(retriever);
        } else {
            warn!(
                key_env = %config.embedding.key_env,
                "no embedding key set, answering without retrieved context"
            );
        }
    }

    if let Some(log) = build_log(config, root)? {
        assistant = assistant.with_log(log);
    }

    Ok(assistant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_log_backends() {
        let dir = tempfile::tempdir().unwrap();

        let config = AbariConfig::from_str("[interaction_log]\nbackend = \"none\"\n").unwrap();
        assert!(build_log(&config, dir.path()).unwrap().is_none());

        let config = AbariConfig::default();
        assert!(build_log(&config, dir.path()).unwrap().is_some());

        let config = AbariConfig::from_str(
            "[interaction_log]\nbackend = \"supabase\"\nurl_env = \"ABARIBOT_TEST_UNSET_SUPABASE_URL\"\n",
        )
        .unwrap();
        let err = build_log(&config, dir.path()).err().unwrap();
        assert!(err.to_string().contains("ABARIBOT_TEST_UNSET_SUPABASE_URL"));
    }

    #[test]
    fn test_build_store_local_resolves_against_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = AbariConfig::default();
        assert!(build_store(&config, dir.path()).is_ok());
    }

    #[tokio::test]
    async fn test_build_assistant_without_keys_uses_local_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = AbariConfig::from_str(
            r#"
[client]
order = ["local"]

[embedding]
key_env = "ABARIBOT_TEST_UNSET_EMBEDDING_KEY"

[interaction_log]
backend = "none"
"#,
        )
        .unwrap();

        let mut assistant = build_assistant(&config, dir.path(), true).unwrap();
        let answer = assistant.ask("Why are my eyes dry?").await.unwrap();
        assert_eq!(answer.context, "");
        assert!(answer.text.contains("consulting your eye doctor"));
    }
}
