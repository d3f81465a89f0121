use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    GenerationRequest, GenerationResult, JsonObject, LlmProvider, ProviderError, ProviderId,
    RemoteSettings, ResponseFormat, Role, normalize_content, parse_envelope, read_success_body,
    send_with_retry, system_instruction,
};

pub const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_MODEL: &str = "mistral-large-latest";
pub const DEFAULT_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Mistral chat completions provider, run in JSON mode
pub struct MistralProvider {
    client: Client,
    settings: RemoteSettings,
}

impl MistralProvider {
    pub fn new(settings: RemoteSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client(settings.timeout)?,
            settings,
        })
    }

    fn build_request<'a>(&'a self, request: &'a GenerationRequest) -> ApiRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ApiMessage {
            role: Role::System,
            content: system_instruction(&self.settings.persona, &request.context),
        });
        for m in &request.messages {
            messages.push(ApiMessage {
                role: m.role,
                content: m.content.clone(),
            });
        }

        ApiRequest {
            model: &self.settings.model,
            messages,
            temperature: request.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: ResponseFormat::JSON_OBJECT,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<JsonObject>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for MistralProvider {
    async fn request(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError> {
        let api_key = self.settings.api_key()?;
        let api_request = self.build_request(request);
        let url = self.settings.endpoint("chat/completions");

        debug!(model = %self.settings.model, messages = api_request.messages.len(), "sending Mistral request");

        let response = send_with_retry(
            || {
                self.client
                    .post(&url)
                    .bearer_auth(api_key)
                    .json(&api_request)
            },
            self.settings.max_retries,
            self.settings.timeout,
        )
        .await?;

        let body = read_success_body(response, self.settings.timeout).await?;
        let api_response: ApiResponse = parse_envelope(&body)?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyCompletion)?;
        debug!(finish_reason = ?choice.finish_reason, "Mistral completion received");

        let text = choice
            .message
            .content
            .ok_or(ProviderError::EmptyCompletion)?;

        Ok(GenerationResult {
            provider: ProviderId::Mistral,
            content: normalize_content(&text),
            usage: api_response.usage.unwrap_or_default(),
        })
    }

    fn id(&self) -> ProviderId {
        ProviderId::Mistral
    }
}
