use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    GenerationRequest, GenerationResult, JsonObject, LlmProvider, ProviderError, ProviderId,
    RemoteSettings, Role, json_instruction, normalize_content, parse_envelope, read_success_body,
    send_with_retry,
};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
pub const DEFAULT_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Anthropic Messages API provider (Claude)
pub struct AnthropicProvider {
    client: Client,
    settings: RemoteSettings,
}

impl AnthropicProvider {
    pub fn new(settings: RemoteSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client(settings.timeout)?,
            settings,
        })
    }

    /// The Messages API takes instructions in a top-level `system` field and rejects
    /// system-role turns, so caller system messages are appended to it instead.
    fn build_request<'a>(&'a self, request: &'a GenerationRequest) -> ApiRequest<'a> {
        let mut system = json_instruction(&self.settings.persona, &request.context);
        let mut messages = Vec::with_capacity(request.messages.len());

        for message in &request.messages {
            match message.role {
                Role::System => {
                    system.push_str("\n\n");
                    system.push_str(&message.content);
                }
                Role::User | Role::Assistant => messages.push(ApiMessage {
                    role: message.role,
                    content: &message.content,
                }),
            }
        }

        ApiRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system,
            messages,
            temperature: request.temperature,
        }
    }
}

// ---------- API request/response types ----------

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<JsonObject>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

// ---------- LlmProvider implementation ----------

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn request(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError> {
        let api_key = self.settings.api_key()?;
        let api_request = self.build_request(request);
        let url = self.settings.endpoint("messages");

        debug!(model = %self.settings.model, messages = api_request.messages.len(), "sending Anthropic request");

        let response = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&api_request)
            },
            self.settings.max_retries,
            self.settings.timeout,
        )
        .await?;

        let body = read_success_body(response, self.settings.timeout).await?;
        let api_response: ApiResponse = parse_envelope(&body)?;

        let blocks: Vec<&str> = api_response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        // An empty text block is still an answer; no text block at all is not
        if blocks.is_empty() {
            debug!(stop_reason = ?api_response.stop_reason, "Anthropic returned no text blocks");
            return Err(ProviderError::EmptyCompletion);
        }
        let text = blocks.join("\n");

        Ok(GenerationResult {
            provider: ProviderId::Anthropic,
            content: normalize_content(&text),
            usage: api_response.usage.unwrap_or_default(),
        })
    }

    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }
}
