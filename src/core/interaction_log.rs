//! Records of answered questions.
//!
//! Every answer is written as a `{prompt, info}` row. Writing is best-effort: a failed
//! write is logged and never reaches the person asking.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::providers::{ProviderId, truncate};

#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub prompt: String,
    pub info: String,
    pub provider: ProviderId,
}

#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, interaction: &Interaction) -> Result<()>;
}

/// Append an interaction, logging instead of failing.
pub async fn record(log: &dyn InteractionLog, interaction: &Interaction) {
    match log.append(interaction).await {
        Ok(()) => debug!(provider = %interaction.provider, "recorded interaction"),
        Err(e) => warn!(error = %format!("{:#}", e), "failed to record interaction"),
    }
}

// ---------- JSONL file ----------

/// One line of the local interaction log
#[derive(Debug, Serialize, Deserialize)]
pub struct InteractionEntry {
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderId,
    pub prompt: String,
    pub info: String,
}

pub struct JsonlLog {
    path: PathBuf,
}

impl JsonlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry back, oldest first
    pub fn read_entries(path: &Path) -> Result<Vec<InteractionEntry>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read interaction log: {}", path.display()))?;
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("Failed to parse interaction log entry"))
            .collect()
    }
}

#[async_trait]
impl InteractionLog for JsonlLog {
    async fn append(&self, interaction: &Interaction) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create log directory: {}", parent.display())
            })?;
        }

        let entry = InteractionEntry {
            timestamp: Utc::now(),
            provider: interaction.provider,
            prompt: interaction.prompt.clone(),
            info: interaction.info.clone(),
        };
        let mut line = serde_json::to_string(&entry).context("Failed to serialize interaction")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open interaction log: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to write interaction log")?;
        file.flush().await.context("Failed to flush interaction log")?;
        Ok(())
    }
}

// ---------- Supabase ----------

/// Inserts rows through the Supabase REST API
pub struct SupabaseLog {
    client: Client,
    url: String,
    key: String,
    table: String,
}

#[derive(Debug, Serialize)]
struct PromptRow<'a> {
    prompt: &'a str,
    info: &'a str,
}

impl SupabaseLog {
    pub fn new(url: String, key: String, table: String) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .context("Failed to build HTTP client")?,
            url: url.trim_end_matches('/').to_string(),
            key,
            table,
        })
    }
}

#[async_trait]
impl InteractionLog for SupabaseLog {
    async fn append(&self, interaction: &Interaction) -> Result<()> {
        let url = format!("{}/rest/v1/{}", self.url, self.table);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "return=minimal")
            .json(&PromptRow {
                prompt: &interaction.prompt,
                info: &interaction.info,
            })
            .send()
            .await
            .context("Failed to send interaction to Supabase")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Supabase returned HTTP {}: {}", status, truncate(&body, 500));
        }
        Ok(())
    }
}
