//! Real API integration tests.
//!
//! These make real calls to the configured providers. They are ignored by default;
//! run them with:
//!
//!     cargo test -- --ignored
//!
//! Each test needs the matching key in the environment (OPENAI_API_KEY,
//! ANTHROPIC_API_KEY, MISTRAL_API_KEY) and is skipped when it is missing.

use abaribot::core::config::AbariConfig;
use abaribot::core::fallback::{FallbackClient, FallbackSettings};
use abaribot::providers::{ChatMessage, ProviderId};

fn single_provider(id: ProviderId) -> Option<FallbackClient> {
    let config = AbariConfig::default();
    let key_env = config.key_env(id)?;
    if std::env::var(&key_env).map(|k| k.is_empty()).unwrap_or(true) {
        eprintln!("Skipping: {} not set", key_env);
        return None;
    }

    let settings = FallbackSettings {
        order: vec![id],
        ..config.fallback_settings()
    };
    Some(FallbackClient::from_settings(settings).unwrap())
}

async fn ask_real(id: ProviderId) {
    let Some(client) = single_provider(id) else {
        return;
    };

    let messages = vec![ChatMessage::user(
        "In one sentence, what is glaucoma? Answer as JSON with a \"response\" field.",
    )];
    let result = client
        .generate(&messages, "Glaucoma is a group of eye conditions that damage the optic nerve.", 0.0)
        .await
        .unwrap_or_else(|e| panic!("{} request failed: {}", id, e));

    assert_eq!(result.provider, id);
    let text = result.answer_text();
    assert!(!text.trim().is_empty(), "empty answer from {}", id);
    eprintln!("{} answered: {}", id, text);
    eprintln!("{} usage: {:?}", id, result.usage);
}

#[tokio::test]
#[ignore]
async fn test_real_openai() {
    ask_real(ProviderId::OpenAi).await;
}

#[tokio::test]
#[ignore]
async fn test_real_anthropic() {
    ask_real(ProviderId::Anthropic).await;
}

#[tokio::test]
#[ignore]
async fn test_real_mistral() {
    ask_real(ProviderId::Mistral).await;
}

/// The default chain always produces an answer, whichever keys are present.
#[tokio::test]
#[ignore]
async fn test_real_default_chain() {
    dotenv::dotenv().ok();
    let client = FallbackClient::from_settings(AbariConfig::default().fallback_settings()).unwrap();
    let result = client
        .generate(&[ChatMessage::user("Are eye floaters dangerous?")], "", 0.3)
        .await
        .unwrap();
    eprintln!("answered by {}: {}", result.provider, result.answer_text());
}
