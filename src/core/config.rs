use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::core::fallback::FallbackSettings;
use crate::providers::local::{DEFAULT_LOCAL_CONFIDENCE, DEFAULT_LOCAL_RESPONSE, LocalSettings};
use crate::providers::{DEFAULT_MAX_TOKENS, DEFAULT_PERSONA, ProviderId, RemoteSettings};
use crate::providers::{anthropic, mistral, openai};

pub const CONFIG_FILE: &str = "abaribot.toml";

/// Valid vector store backends
const VALID_VECTOR_BACKENDS: &[&str] = &["local", "pinecone"];

/// Valid interaction log backends
const VALID_LOG_BACKENDS: &[&str] = &["jsonl", "supabase", "none"];

/// Template written by `abaribot init`. Parses to the same values as an empty file.
pub const DEFAULT_CONFIG: &str = r#"[assistant]
persona = "You are Dr.Eye, an ophthalmology specialist."
temperature = 0.7
top_k = 1

[client]
timeout_secs = 30
max_retries = 2
max_tokens = 1024
order = ["openai", "anthropic", "mistral", "local"]

[providers.openai]
model = "gpt-3.5-turbo"
key_env = "OPENAI_API_KEY"

[providers.anthropic]
model = "claude-3-opus-20240229"
key_env = "ANTHROPIC_API_KEY"

[providers.mistral]
model = "mistral-large-latest"
key_env = "MISTRAL_API_KEY"

[providers.local]
response = "As an ophthalmology specialist, I recommend consulting your eye doctor about this concern."
confidence = 0.85

[embedding]
model = "text-embedding-ada-002"
key_env = "OPENAI_API_KEY"

[vector_store]
backend = "local"
path = ".abaribot/vectors.json"
# backend = "pinecone"
# index_host = "https://abaribot-xxxxxxx.svc.us-east-1.pinecone.io"
key_env = "PINECONE_API_KEY"

[chunking]
chunk_size = 1000
overlap = 100

[interaction_log]
backend = "jsonl"
path = ".abaribot/interactions.jsonl"
url_env = "SUPABASE_URL"
key_env = "SUPABASE_KEY"
table = "prompts"
"#;

/// Project configuration from abaribot.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AbariConfig {
    pub assistant: AssistantConfig,
    pub client: ClientConfig,
    pub providers: ProvidersConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub chunking: ChunkingConfig,
    pub interaction_log: InteractionLogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub persona: String,
    pub temperature: f64,
    pub top_k: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            temperature: 0.7,
            top_k: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_tokens: u32,
    pub order: Vec<ProviderId>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            max_tokens: DEFAULT_MAX_TOKENS,
            order: ProviderId::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: RemoteProviderConfig,
    pub anthropic: RemoteProviderConfig,
    pub mistral: RemoteProviderConfig,
    pub local: LocalProviderConfig,
}

/// Per-provider overrides. Unset fields take that provider's built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteProviderConfig {
    pub model: Option<String>,
    pub key_env: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalProviderConfig {
    pub response: String,
    pub confidence: f64,
}

impl Default for LocalProviderConfig {
    fn default() -> Self {
        Self {
            response: DEFAULT_LOCAL_RESPONSE.to_string(),
            confidence: DEFAULT_LOCAL_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub key_env: String,
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-ada-002".to_string(),
            key_env: openai::DEFAULT_KEY_ENV.to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub backend: String,
    /// JSON file backing the `local` backend, relative to the project root
    pub path: PathBuf,
    /// Index host for the `pinecone` backend
    pub index_host: Option<String>,
    pub key_env: String,
    pub namespace: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: "local".to_string(),
            path: PathBuf::from(".abaribot/vectors.json"),
            index_host: None,
            key_env: "PINECONE_API_KEY".to_string(),
            namespace: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InteractionLogConfig {
    pub backend: String,
    pub path: PathBuf,
    pub url_env: String,
    pub key_env: String,
    pub table: String,
}

impl Default for InteractionLogConfig {
    fn default() -> Self {
        Self {
            backend: "jsonl".to_string(),
            path: PathBuf::from(".abaribot/interactions.jsonl"),
            url_env: "SUPABASE_URL".to_string(),
            key_env: "SUPABASE_KEY".to_string(),
            table: "prompts".to_string(),
        }
    }
}

/// Built-in model, key variable and endpoint of a remote provider
struct RemoteDefaults {
    model: &'static str,
    key_env: &'static str,
    base_url: &'static str,
}

const OPENAI_DEFAULTS: RemoteDefaults = RemoteDefaults {
    model: openai::DEFAULT_MODEL,
    key_env: openai::DEFAULT_KEY_ENV,
    base_url: openai::OPENAI_API_BASE,
};

const ANTHROPIC_DEFAULTS: RemoteDefaults = RemoteDefaults {
    model: anthropic::DEFAULT_MODEL,
    key_env: anthropic::DEFAULT_KEY_ENV,
    base_url: anthropic::ANTHROPIC_API_BASE,
};

const MISTRAL_DEFAULTS: RemoteDefaults = RemoteDefaults {
    model: mistral::DEFAULT_MODEL,
    key_env: mistral::DEFAULT_KEY_ENV,
    base_url: mistral::MISTRAL_API_BASE,
};

impl AbariConfig {
    /// Load and validate configuration from an abaribot.toml file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: AbariConfig =
            toml::from_str(content).context("Failed to parse abaribot.toml")?;

        config.validate()?;
        Ok(config)
    }

    /// Walk up from `start_dir` looking for abaribot.toml. Returns the file path if found.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut current = start_dir.to_path_buf();
        loop {
            let config_path = current.join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load the nearest abaribot.toml, or the defaults rooted at `start_dir` when there
    /// is none. Returns the config and the project root.
    pub fn load_or_default(start_dir: &Path) -> Result<(Self, PathBuf)> {
        match Self::find(start_dir) {
            Some(path) => {
                let config = Self::from_file(&path)?;
                let root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| start_dir.to_path_buf());
                Ok((config, root))
            }
            None => Ok((Self::default(), start_dir.to_path_buf())),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        let temperature = self.assistant.temperature;
        if !(0.0..=1.0).contains(&temperature) {
            bail!(
                "Invalid temperature {} in abaribot.toml. Must be between 0.0 and 1.0",
                temperature
            );
        }

        if self.assistant.top_k == 0 {
            bail!("Invalid top_k 0 in abaribot.toml. Must be at least 1");
        }

        if self.client.timeout_secs == 0 {
            bail!("Invalid timeout_secs 0 in abaribot.toml. Must be at least 1");
        }

        if self.client.order.is_empty() {
            bail!("Provider order in abaribot.toml is empty. List at least one provider");
        }

        let mut seen = HashSet::new();
        for id in &self.client.order {
            if !seen.insert(id) {
                bail!("Provider '{}' appears twice in the provider order", id);
            }
        }

        if self.chunking.chunk_size == 0 || self.chunking.overlap >= self.chunking.chunk_size {
            bail!(
                "Invalid chunking (chunk_size = {}, overlap = {}). Overlap must be smaller than a non-zero chunk size",
                self.chunking.chunk_size,
                self.chunking.overlap
            );
        }

        if !VALID_VECTOR_BACKENDS.contains(&self.vector_store.backend.as_str()) {
            bail!(
                "Invalid vector store backend '{}' in abaribot.toml. Must be one of: {}",
                self.vector_store.backend,
                VALID_VECTOR_BACKENDS.join(", ")
            );
        }

        if self.vector_store.backend == "pinecone" && self.vector_store.index_host.is_none() {
            bail!("The pinecone vector store needs `index_host` in [vector_store]");
        }

        if !VALID_LOG_BACKENDS.contains(&self.interaction_log.backend.as_str()) {
            bail!(
                "Invalid interaction log backend '{}' in abaribot.toml. Must be one of: {}",
                self.interaction_log.backend,
                VALID_LOG_BACKENDS.join(", ")
            );
        }

        Ok(())
    }

    fn remote_entry(&self, id: ProviderId) -> Option<(&RemoteProviderConfig, &'static RemoteDefaults)> {
        match id {
            ProviderId::OpenAi => Some((&self.providers.openai, &OPENAI_DEFAULTS)),
            ProviderId::Anthropic => Some((&self.providers.anthropic, &ANTHROPIC_DEFAULTS)),
            ProviderId::Mistral => Some((&self.providers.mistral, &MISTRAL_DEFAULTS)),
            ProviderId::LocalFallback => None,
        }
    }

    /// Name of the environment variable holding a remote provider's key
    pub fn key_env(&self, id: ProviderId) -> Option<String> {
        let (overrides, defaults) = self.remote_entry(id)?;
        Some(
            overrides
                .key_env
                .clone()
                .unwrap_or_else(|| defaults.key_env.to_string()),
        )
    }

    /// Settings for one remote provider, with its key read from the environment.
    /// `None` for the local provider, which has no remote settings.
    pub fn remote_settings(&self, id: ProviderId) -> Option<RemoteSettings> {
        let (overrides, defaults) = self.remote_entry(id)?;
        Some(self.build_remote(overrides, defaults))
    }

    // A missing key is not an error here: that provider fails fast inside the chain.
    fn build_remote(&self, overrides: &RemoteProviderConfig, defaults: &RemoteDefaults) -> RemoteSettings {
        let key_env = overrides.key_env.as_deref().unwrap_or(defaults.key_env);

        RemoteSettings {
            model: overrides
                .model
                .clone()
                .unwrap_or_else(|| defaults.model.to_string()),
            api_key: resolve_secret(key_env),
            base_url: overrides
                .base_url
                .clone()
                .unwrap_or_else(|| defaults.base_url.to_string()),
            persona: self.assistant.persona.clone(),
            max_tokens: self.client.max_tokens,
            timeout: Duration::from_secs(self.client.timeout_secs),
            max_retries: self.client.max_retries,
        }
    }

    /// Resolve everything the fallback chain needs, once.
    pub fn fallback_settings(&self) -> FallbackSettings {
        FallbackSettings {
            order: self.client.order.clone(),
            openai: self.build_remote(&self.providers.openai, &OPENAI_DEFAULTS),
            anthropic: self.build_remote(&self.providers.anthropic, &ANTHROPIC_DEFAULTS),
            mistral: self.build_remote(&self.providers.mistral, &MISTRAL_DEFAULTS),
            local: LocalSettings {
                response: self.providers.local.response.clone(),
                confidence: self.providers.local.confidence,
            },
        }
    }

    /// Resolve a relative config path against the project root
    pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

/// Read a secret from the environment. Empty values count as unset.
pub fn resolve_secret(key_env: &str) -> Option<String> {
    std::env::var(key_env).ok().filter(|v| !v.trim().is_empty())
}

/// Like `resolve_secret`, but failing with a hint when the variable is unset.
pub fn require_secret(key_env: &str) -> Result<String> {
    resolve_secret(key_env).with_context(|| {
        format!(
            "Secret not found. Set the {} environment variable.\n\
             Hint: export {}=... or add it to .env",
            key_env, key_env
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AbariConfig::from_str("").unwrap();
        assert_eq!(config.assistant.persona, DEFAULT_PERSONA);
        assert_eq!(config.assistant.temperature, 0.7);
        assert_eq!(config.assistant.top_k, 1);
        assert_eq!(config.client.timeout_secs, 30);
        assert_eq!(config.client.max_retries, 2);
        assert_eq!(config.client.max_tokens, 1024);
        assert_eq!(config.client.order, ProviderId::ALL.to_vec());
        assert_eq!(config.providers.local.confidence, 0.85);
        assert_eq!(config.vector_store.backend, "local");
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.interaction_log.backend, "jsonl");
    }

    #[test]
    fn test_default_template_matches_defaults() {
        let template = AbariConfig::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = AbariConfig::default();

        assert_eq!(template.assistant.persona, defaults.assistant.persona);
        assert_eq!(template.client.order, defaults.client.order);
        assert_eq!(template.providers.local.response, defaults.providers.local.response);
        assert_eq!(template.embedding.model, defaults.embedding.model);
        assert_eq!(template.vector_store.path, defaults.vector_store.path);
        assert_eq!(template.interaction_log.table, defaults.interaction_log.table);

        for id in [ProviderId::OpenAi, ProviderId::Anthropic, ProviderId::Mistral] {
            let a = template.remote_settings(id).unwrap();
            let b = defaults.remote_settings(id).unwrap();
            assert_eq!(a.model, b.model, "{id} model");
            assert_eq!(a.base_url, b.base_url, "{id} base_url");
            assert_eq!(template.key_env(id), defaults.key_env(id));
        }
    }

    #[test]
    fn test_partial_provider_override_keeps_other_defaults() {
        let toml = r#"
[providers.anthropic]
model = "claude-3-haiku-20240307"

[providers.mistral]
base_url = "http://localhost:8080/v1"
key_env = "MY_MISTRAL_KEY"
"#;
        let config = AbariConfig::from_str(toml).unwrap();

        let anthropic = config.remote_settings(ProviderId::Anthropic).unwrap();
        assert_eq!(anthropic.model, "claude-3-haiku-20240307");
        assert_eq!(anthropic.base_url, anthropic::ANTHROPIC_API_BASE);
        assert_eq!(config.key_env(ProviderId::Anthropic).unwrap(), "ANTHROPIC_API_KEY");

        let mistral = config.remote_settings(ProviderId::Mistral).unwrap();
        assert_eq!(mistral.model, mistral::DEFAULT_MODEL);
        assert_eq!(mistral.base_url, "http://localhost:8080/v1");
        assert_eq!(config.key_env(ProviderId::Mistral).unwrap(), "MY_MISTRAL_KEY");
        assert!(config.key_env(ProviderId::LocalFallback).is_none());
        assert!(config.remote_settings(ProviderId::LocalFallback).is_none());
    }

    #[test]
    fn test_client_settings_flow_into_remote_settings() {
        let toml = r#"
[assistant]
persona = "You are a careful optometrist."

[client]
timeout_secs = 5
max_retries = 0
max_tokens = 300
order = ["mistral", "local"]
"#;
        let config = AbariConfig::from_str(toml).unwrap();
        let settings = config.fallback_settings();

        assert_eq!(settings.order, vec![ProviderId::Mistral, ProviderId::LocalFallback]);
        assert_eq!(settings.mistral.timeout, Duration::from_secs(5));
        assert_eq!(settings.mistral.max_retries, 0);
        assert_eq!(settings.mistral.max_tokens, 300);
        assert_eq!(settings.openai.persona, "You are a careful optometrist.");
    }

    #[test]
    fn test_secrets_resolve_from_env() {
        let toml = r#"
[providers.openai]
key_env = "ABARIBOT_TEST_OPENAI_KEY"
"#;
        let config = AbariConfig::from_str(toml).unwrap();

        unsafe { std::env::set_var("ABARIBOT_TEST_OPENAI_KEY", "sk-test-123") };
        assert_eq!(
            config.remote_settings(ProviderId::OpenAi).unwrap().api_key.as_deref(),
            Some("sk-test-123")
        );

        unsafe { std::env::set_var("ABARIBOT_TEST_OPENAI_KEY", "  ") };
        assert!(config.remote_settings(ProviderId::OpenAi).unwrap().api_key.is_none());

        unsafe { std::env::remove_var("ABARIBOT_TEST_OPENAI_KEY") };
        assert!(config.remote_settings(ProviderId::OpenAi).unwrap().api_key.is_none());
    }

    #[test]
    fn test_require_secret_missing() {
        unsafe { std::env::remove_var("ABARIBOT_TEST_MISSING_SECRET") };
        let err = require_secret("ABARIBOT_TEST_MISSING_SECRET").unwrap_err();
        assert!(
            err.to_string().contains("ABARIBOT_TEST_MISSING_SECRET"),
            "Expected env var name in error, got: {}",
            err
        );
    }

    #[test]
    fn test_invalid_temperature() {
        let err = AbariConfig::from_str("[assistant]\ntemperature = 1.5\n").unwrap_err();
        assert!(
            err.to_string().contains("Invalid temperature"),
            "Expected temperature error, got: {}",
            err
        );
    }

    #[test]
    fn test_unknown_provider_in_order() {
        let err = AbariConfig::from_str("[client]\norder = [\"openai\", \"gemini\"]\n").unwrap_err();
        assert!(
            err.to_string().contains("Failed to parse"),
            "Expected parse error, got: {}",
            err
        );
    }

    #[test]
    fn test_duplicate_provider_in_order() {
        let err = AbariConfig::from_str("[client]\norder = [\"openai\", \"local\", \"openai\"]\n")
            .unwrap_err();
        assert!(err.to_string().contains("appears twice"), "got: {}", err);
    }

    #[test]
    fn test_empty_order() {
        let err = AbariConfig::from_str("[client]\norder = []\n").unwrap_err();
        assert!(err.to_string().contains("empty"), "got: {}", err);
    }

    #[test]
    fn test_invalid_chunking() {
        let err = AbariConfig::from_str("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("Invalid chunking"), "got: {}", err);
    }

    #[test]
    fn test_invalid_backends() {
        let err = AbariConfig::from_str("[vector_store]\nbackend = \"faiss\"\n").unwrap_err();
        assert!(err.to_string().contains("Invalid vector store backend"), "got: {}", err);

        let err = AbariConfig::from_str("[vector_store]\nbackend = \"pinecone\"\n").unwrap_err();
        assert!(err.to_string().contains("index_host"), "got: {}", err);

        let err = AbariConfig::from_str("[interaction_log]\nbackend = \"sqlite\"\n").unwrap_err();
        assert!(err.to_string().contains("Invalid interaction log backend"), "got: {}", err);
    }

    #[test]
    fn test_load_or_default_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("docs/deep");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, root) = AbariConfig::load_or_default(&nested).unwrap();
        assert_eq!(root, nested);
        assert_eq!(config.assistant.top_k, 1);

        std::fs::write(dir.path().join(CONFIG_FILE), "[assistant]\ntop_k = 3\n").unwrap();
        let (config, root) = AbariConfig::load_or_default(&nested).unwrap();
        assert_eq!(root, dir.path());
        assert_eq!(config.assistant.top_k, 3);
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/srv/abaribot");
        assert_eq!(
            AbariConfig::resolve_path(root, Path::new(".abaribot/vectors.json")),
            PathBuf::from("/srv/abaribot/.abaribot/vectors.json")
        );
        assert_eq!(
            AbariConfig::resolve_path(root, Path::new("/tmp/v.json")),
            PathBuf::from("/tmp/v.json")
        );
    }
}
