//! Built-in provider that never fails. It terminates the fallback chain with a
//! canned, low-confidence answer.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{GenerationRequest, GenerationResult, JsonObject, LlmProvider, ProviderError, ProviderId};

pub const DEFAULT_LOCAL_RESPONSE: &str =
    "As an ophthalmology specialist, I recommend consulting your eye doctor about this concern.";
pub const DEFAULT_LOCAL_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSettings {
    pub response: String,
    pub confidence: f64,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            response: DEFAULT_LOCAL_RESPONSE.to_string(),
            confidence: DEFAULT_LOCAL_CONFIDENCE,
        }
    }
}

pub struct LocalFallbackProvider {
    settings: LocalSettings,
}

impl LocalFallbackProvider {
    pub fn new(settings: LocalSettings) -> Self {
        Self { settings }
    }
}

impl Default for LocalFallbackProvider {
    fn default() -> Self {
        Self::new(LocalSettings::default())
    }
}

#[async_trait]
impl LlmProvider for LocalFallbackProvider {
    async fn request(&self, _request: &GenerationRequest) -> Result<GenerationResult, ProviderError> {
        let mut content = JsonObject::new();
        content.insert(
            "response".to_string(),
            Value::String(self.settings.response.clone()),
        );
        content.insert("confidence".to_string(), json!(self.settings.confidence));

        Ok(GenerationResult {
            provider: ProviderId::LocalFallback,
            content,
            usage: JsonObject::new(),
        })
    }

    fn id(&self) -> ProviderId {
        ProviderId::LocalFallback
    }
}
