pub mod anthropic;
pub mod local;
pub mod mistral;
pub mod openai;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// A JSON object, as returned in `GenerationResult::content` and `usage`.
pub type JsonObject = Map<String, Value>;

/// Persona injected into every remote provider's instruction channel.
pub const DEFAULT_PERSONA: &str = "You are Dr.Eye, an ophthalmology specialist.";

/// Default cap on completion size sent to remote providers.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Trait for LLM providers taking part in the fallback chain
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn request(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError>;
    fn id(&self) -> ProviderId;
}

/// Known providers, declared in default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "local")]
    LocalFallback,
}

impl ProviderId {
    /// Default fallback order: remote providers first, the local safety net last.
    pub const ALL: [ProviderId; 4] = [
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::Mistral,
        ProviderId::LocalFallback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Mistral => "mistral",
            ProviderId::LocalFallback => "local",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request handed to every provider in the chain
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    /// Retrieved text placed in the instruction channel. Passed through unvalidated.
    pub context: String,
    pub temperature: f64,
}

impl GenerationRequest {
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;

    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            context: String::new(),
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Structured answer from the first provider that succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub provider: ProviderId,
    /// Parsed completion, or `{"response": <raw text>}` when it was not a JSON object.
    pub content: JsonObject,
    /// Provider usage block, passed through unmodified. Empty when the provider sent none.
    pub usage: JsonObject,
}

impl GenerationResult {
    /// Text to show a user: the `response` field when it is a string, else the whole
    /// content as pretty JSON.
    pub fn answer_text(&self) -> String {
        match self.content.get("response") {
            Some(Value::String(text)) => text.clone(),
            _ => serde_json::to_string_pretty(&self.content).unwrap_or_default(),
        }
    }
}

/// Errors a single provider attempt can produce. The fallback chain recovers from all of them.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("config error: {0}")]
    Config(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("API error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("provider returned no completion")]
    EmptyCompletion,
}

impl ProviderError {
    /// HTTP status carried by the error, if the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Authentication { status, .. }
            | ProviderError::RateLimited { status, .. }
            | ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Resolved settings for one remote provider adapter.
#[derive(Clone)]
pub struct RemoteSettings {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub persona: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    /// Extra attempts after a failed connection. Answered requests are never repeated.
    pub max_retries: u32,
}

impl RemoteSettings {
    pub fn new(model: impl Into<String>, api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.into(),
            persona: DEFAULT_PERSONA.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ProviderError::MissingApiKey)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("persona", &self.persona)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// ---------- Shared adapter plumbing ----------

/// Instruction text combining the persona with the caller's context.
pub(crate) fn system_instruction(persona: &str, context: &str) -> String {
    format!("{} Context: {}", persona, context)
}

/// Instruction text for providers asked to answer in JSON.
pub(crate) fn json_instruction(persona: &str, context: &str) -> String {
    format!("{} Respond in JSON format.", system_instruction(persona, context))
}

/// `response_format` body field selecting JSON-object output.
#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

impl ResponseFormat {
    pub(crate) const JSON_OBJECT: ResponseFormat = ResponseFormat {
        format_type: "json_object",
    };
}

/// Try JSON, else wrap: a JSON object becomes the content as-is, anything else is
/// wrapped as `{"response": text}`.
pub fn normalize_content(text: &str) -> JsonObject {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("response".to_string(), Value::String(text.to_string()));
            map
        }
    }
}

/// HTTP client that keeps no idle connections between calls.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))
}

/// Sends the request produced by `build`, rebuilding and resending it only when the
/// connection could not be established.
pub(crate) async fn send_with_retry<F>(
    build: F,
    max_retries: u32,
    timeout: Duration,
) -> Result<Response, ProviderError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        match build().send().await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_connect() && attempt < max_retries => {
                attempt += 1;
                debug!(attempt, max_retries, error = %err, "connection failed, retrying");
            }
            Err(err) => return Err(transport_error(err, timeout)),
        }
    }
}

/// Reads the response body, mapping non-success statuses onto `ProviderError`.
pub(crate) async fn read_success_body(
    response: Response,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| transport_error(err, timeout))?;

    if !status.is_success() {
        return Err(classify_status(status.as_u16(), &body));
    }
    Ok(body)
}

pub(crate) fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("{e}: {}", truncate(body, 200))))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Network(err.to_string())
    }
}

// Covers `{"error": {"type", "message"}}` (OpenAI, Anthropic) and the flat
// `{"type", "message"}` shape Mistral uses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: String,
}

pub(crate) fn classify_status(status: u16, body: &str) -> ProviderError {
    let message = error_message(body);
    match status {
        401 | 403 => ProviderError::Authentication { status, message },
        429 => ProviderError::RateLimited { status, message },
        _ => ProviderError::Status { status, message },
    }
}

fn error_message(body: &str) -> String {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return truncate(body, 500).to_string();
    };

    let (error_type, message) = match envelope.error {
        Some(detail) => (detail.error_type, Some(detail.message)),
        None => (envelope.error_type, envelope.message),
    };

    match (error_type, message) {
        (Some(t), Some(m)) => format!("{t}: {m}"),
        (None, Some(m)) => m,
        _ => truncate(body, 500).to_string(),
    }
}

/// Cuts `text` to at most `max` bytes without splitting a character.
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
