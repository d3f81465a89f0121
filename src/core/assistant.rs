use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::core::fallback::FallbackClient;
use crate::core::interaction_log::{Interaction, InteractionLog, record};
use crate::core::retrieval::Retriever;
use crate::providers::{ChatMessage, GenerationRequest, GenerationResult};

/// An answered question
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub result: GenerationResult,
    /// Retrieved context the answer was generated with
    pub context: String,
}

/// A chat session: retrieval, generation through the fallback chain, and the
/// conversation so far.
pub struct Assistant {
    client: FallbackClient,
    retriever: Option<Retriever>,
    log: Option<Box<dyn InteractionLog>>,
    conversation: Vec<ChatMessage>,
    temperature: f64,
    top_k: usize,
}

impl Assistant {
    pub fn new(client: FallbackClient) -> Self {
        Self {
            client,
            retriever: None,
            log: None,
            conversation: Vec::new(),
            temperature: GenerationRequest::DEFAULT_TEMPERATURE,
            top_k: 1,
        }
    }

    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_log(mut self, log: Box<dyn InteractionLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    /// Answer a question in the context of the conversation so far. The conversation
    /// only grows when an answer is produced.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            bail!("Question is empty");
        }

        let context = self.context_for(question).await;

        let mut messages = self.conversation.clone();
        messages.push(ChatMessage::user(question));

        let result = self
            .client
            .generate(&messages, &context, self.temperature)
            .await?;
        let text = result.answer_text();
        debug!(provider = %result.provider, chars = text.len(), "answered question");

        self.conversation.push(ChatMessage::user(question));
        self.conversation.push(ChatMessage::assistant(text.clone()));

        if let Some(log) = &self.log {
            let interaction = Interaction {
                prompt: question.to_string(),
                info: text.clone(),
                provider: result.provider,
            };
            record(log.as_ref(), &interaction).await;
        }

        Ok(Answer {
            text,
            result,
            context,
        })
    }

    // Retrieval problems degrade to an answer without context.
    async fn context_for(&self, question: &str) -> String {
        let Some(retriever) = &self.retriever else {
            return String::new();
        };
        match retriever.context_for(question, self.top_k).await {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "context retrieval failed, answering without it");
                String::new()
            }
        }
    }
}
