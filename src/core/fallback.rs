use thiserror::Error;
use tracing::{debug, info, warn};

use crate::providers::anthropic::AnthropicProvider;
use crate::providers::local::{LocalFallbackProvider, LocalSettings};
use crate::providers::mistral::MistralProvider;
use crate::providers::openai::OpenAiProvider;
use crate::providers::{
    ChatMessage, GenerationRequest, GenerationResult, LlmProvider, ProviderError, ProviderId,
    RemoteSettings,
};

// ---------- Public types ----------

/// One failed attempt, kept for the aggregate error
#[derive(Debug)]
pub struct ProviderFailure {
    pub provider: ProviderId,
    pub error: ProviderError,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    /// Every provider in the chain was tried once and each failed.
    #[error("all LLM providers failed: {}", describe_failures(.failures))]
    AllProvidersFailed { failures: Vec<ProviderFailure> },
}

fn describe_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.provider, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything needed to build the default chain, resolved once at startup.
#[derive(Debug, Clone)]
pub struct FallbackSettings {
    pub order: Vec<ProviderId>,
    pub openai: RemoteSettings,
    pub anthropic: RemoteSettings,
    pub mistral: RemoteSettings,
    pub local: LocalSettings,
}

/// Tries each provider in priority order and returns the first success.
pub struct FallbackClient {
    providers: Vec<Box<dyn LlmProvider>>,
}

// ---------- Implementation ----------

impl FallbackClient {
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers }
    }

    pub fn from_settings(settings: FallbackSettings) -> Result<Self, ProviderError> {
        let mut providers: Vec<Box<dyn LlmProvider>> = Vec::with_capacity(settings.order.len());

        for id in &settings.order {
            let provider: Box<dyn LlmProvider> = match id {
                ProviderId::OpenAi => Box::new(OpenAiProvider::new(settings.openai.clone())?),
                ProviderId::Anthropic => {
                    Box::new(AnthropicProvider::new(settings.anthropic.clone())?)
                }
                ProviderId::Mistral => Box::new(MistralProvider::new(settings.mistral.clone())?),
                ProviderId::LocalFallback => {
                    Box::new(LocalFallbackProvider::new(settings.local.clone()))
                }
            };
            providers.push(provider);
        }

        Ok(Self::new(providers))
    }

    /// Provider ids in the order they will be attempted
    pub fn order(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        context: &str,
        temperature: f64,
    ) -> Result<GenerationResult, GenerateError> {
        let request = GenerationRequest::new(messages.to_vec())
            .with_context(context)
            .with_temperature(temperature);
        self.generate_request(&request).await
    }

    /// Runs the chain. Providers are attempted strictly one after another and at most
    /// once each; the first success ends the call.
    pub async fn generate_request(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerateError> {
        let mut failures = Vec::new();

        for provider in &self.providers {
            let id = provider.id();
            debug!(provider = %id, "requesting completion");

            match provider.request(request).await {
                Ok(result) => {
                    if !failures.is_empty() {
                        info!(provider = %id, failed = failures.len(), "answered by fallback provider");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    warn!(provider = %id, error = %error, "provider failed");
                    failures.push(ProviderFailure { provider: id, error });
                }
            }
        }

        Err(GenerateError::AllProvidersFailed { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::DEFAULT_LOCAL_RESPONSE;
    use crate::providers::{JsonObject, normalize_content};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider stub that either always succeeds or always fails, counting calls.
    struct Scripted {
        id: ProviderId,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(id: ProviderId, succeed: bool) -> (Box<dyn LlmProvider>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let provider = Box::new(Scripted {
                id,
                succeed,
                calls: calls.clone(),
            });
            (provider, calls)
        }
    }

    #[async_trait]
    impl LlmProvider for Scripted {
        async fn request(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Err(ProviderError::Status {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(GenerationResult {
                provider: self.id,
                content: normalize_content(&request.context),
                usage: JsonObject::new(),
            })
        }

        fn id(&self) -> ProviderId {
            self.id
        }
    }

    fn question() -> Vec<ChatMessage> {
        vec![ChatMessage::user("What is glaucoma?")]
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let (openai, openai_calls) = Scripted::new(ProviderId::OpenAi, true);
        let (anthropic, anthropic_calls) = Scripted::new(ProviderId::Anthropic, true);
        let (local, local_calls) = Scripted::new(ProviderId::LocalFallback, true);
        let client = FallbackClient::new(vec![openai, anthropic, local]);

        let result = client.generate(&question(), "ctx", 0.7).await.unwrap();

        assert_eq!(result.provider, ProviderId::OpenAi);
        assert_eq!(openai_calls.load(Ordering::SeqCst), 1);
        assert_eq!(anthropic_calls.load(Ordering::SeqCst), 0);
        assert_eq!(local_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_falls_through_in_order() {
        let (openai, openai_calls) = Scripted::new(ProviderId::OpenAi, false);
        let (anthropic, anthropic_calls) = Scripted::new(ProviderId::Anthropic, false);
        let (mistral, mistral_calls) = Scripted::new(ProviderId::Mistral, true);
        let (local, local_calls) = Scripted::new(ProviderId::LocalFallback, true);
        let client = FallbackClient::new(vec![openai, anthropic, mistral, local]);

        let result = client.generate(&question(), "", 0.2).await.unwrap();

        assert_eq!(result.provider, ProviderId::Mistral);
        assert_eq!(openai_calls.load(Ordering::SeqCst), 1);
        assert_eq!(anthropic_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mistral_calls.load(Ordering::SeqCst), 1);
        assert_eq!(local_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_every_failure() {
        let (openai, _) = Scripted::new(ProviderId::OpenAi, false);
        let (mistral, mistral_calls) = Scripted::new(ProviderId::Mistral, false);
        let client = FallbackClient::new(vec![openai, mistral]);

        let err = client.generate(&question(), "", 0.7).await.unwrap_err();
        let GenerateError::AllProvidersFailed { failures } = &err;

        let attempted: Vec<ProviderId> = failures.iter().map(|f| f.provider).collect();
        assert_eq!(attempted, vec![ProviderId::OpenAi, ProviderId::Mistral]);
        assert_eq!(mistral_calls.load(Ordering::SeqCst), 1, "each provider tried once");
        assert!(err.to_string().contains("openai: API error (HTTP 500): boom"));
        assert!(err.to_string().contains("mistral: API error (HTTP 500): boom"));
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let client = FallbackClient::new(Vec::new());
        let err = client.generate(&question(), "", 0.7).await.unwrap_err();
        assert!(err.to_string().contains("no providers configured"));
    }

    #[tokio::test]
    async fn test_default_chain_without_keys_degrades_to_local() {
        let settings = FallbackSettings {
            order: ProviderId::ALL.to_vec(),
            openai: RemoteSettings::new("gpt", None, "http://127.0.0.1:1"),
            anthropic: RemoteSettings::new("claude", None, "http://127.0.0.1:1"),
            mistral: RemoteSettings::new("mistral", None, "http://127.0.0.1:1"),
            local: LocalSettings::default(),
        };
        let client = FallbackClient::from_settings(settings).unwrap();
        assert_eq!(client.order(), ProviderId::ALL.to_vec());

        let result = client.generate(&question(), "", 0.3).await.unwrap();
        assert_eq!(result.provider, ProviderId::LocalFallback);
        assert_eq!(result.content["response"], DEFAULT_LOCAL_RESPONSE);
    }

    #[tokio::test]
    async fn test_custom_order_is_respected() {
        let settings = FallbackSettings {
            order: vec![ProviderId::LocalFallback, ProviderId::OpenAi],
            openai: RemoteSettings::new("gpt", None, "http://127.0.0.1:1"),
            anthropic: RemoteSettings::new("claude", None, "http://127.0.0.1:1"),
            mistral: RemoteSettings::new("mistral", None, "http://127.0.0.1:1"),
            local: LocalSettings {
                response: "local first".to_string(),
                confidence: 0.5,
            },
        };
        let client = FallbackClient::from_settings(settings).unwrap();
        assert_eq!(
            client.order(),
            vec![ProviderId::LocalFallback, ProviderId::OpenAi]
        );

        let result = client.generate(&question(), "", 0.7).await.unwrap();
        assert_eq!(result.content["response"], "local first");
        assert_eq!(result.content["confidence"], 0.5);
    }
}
