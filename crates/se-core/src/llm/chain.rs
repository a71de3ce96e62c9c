//! Reply chain construction
//!
//! A chain binds a user's long-lived context (profile and mood summary) to
//! the model, so each request only carries the message and per-turn history.
//! Chains are expensive to build and cheap to reuse; the session cache holds
//! on to them across turns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::client::GeminiClient;
use crate::llm::types::{ChatMessage, Content, GenerateContentRequest, GenerationConfig};

/// Long-lived per-user context woven into the system prompt
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub user_id: String,
    /// Display name from the user profile
    pub display_name: Option<String>,
    /// Summary of the user's recent daily mood logs
    pub mood_summary: Option<String>,
}

impl UserContext {
    /// Bare context for a user with no profile data
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

/// A reply generator bound to one user's context
#[async_trait]
pub trait ReplyChain: Send + Sync {
    /// Generate a reply to `message` given the prior `history`
    async fn generate(&self, message: &str, history: &[ChatMessage]) -> Result<String>;
}

/// Builds reply chains from user context
#[async_trait]
pub trait ChainFactory: Send + Sync {
    /// Build a reply chain bound to the given user context
    async fn build(&self, context: &UserContext) -> Result<Arc<dyn ReplyChain>>;
}

/// Source of per-user context (profile and mood summaries)
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn user_context(&self, user_id: &str) -> Result<UserContext>;
}

/// System prompt for the wellness companion, personalized per user
fn build_system_prompt(context: &UserContext) -> String {
    let mut prompt = String::from(
        "You are a supportive mental wellness companion. Respond with warmth \
         and empathy, keep replies short and conversational, and never give \
         medical diagnoses. For serious concerns, gently encourage reaching \
         out to a mental health professional.",
    );

    if let Some(name) = &context.display_name {
        prompt.push_str("\nThe user's name is ");
        prompt.push_str(name);
        prompt.push('.');
    }

    if let Some(summary) = &context.mood_summary {
        prompt.push_str("\nSummary of the user's recent mood logs: ");
        prompt.push_str(summary);
    }

    prompt
}

/// Chain factory backed by the Gemini API
pub struct GeminiChainFactory {
    client: GeminiClient,
}

impl GeminiChainFactory {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainFactory for GeminiChainFactory {
    async fn build(&self, context: &UserContext) -> Result<Arc<dyn ReplyChain>> {
        Ok(Arc::new(GeminiChain {
            client: self.client.clone(),
            system_prompt: build_system_prompt(context),
        }))
    }
}

/// Gemini-backed reply chain with a fixed system prompt
struct GeminiChain {
    client: GeminiClient,
    system_prompt: String,
}

#[async_trait]
impl ReplyChain for GeminiChain {
    async fn generate(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        let mut contents: Vec<Content> = history.iter().map(Content::from).collect();
        contents.push(Content::text("user", message));

        let request = GenerateContentRequest {
            system_instruction: Some(Content::system(self.system_prompt.clone())),
            contents,
            generation_config: Some(GenerationConfig {
                temperature: Some(0.7),
                max_output_tokens: Some(1024),
            }),
        };

        self.client.generate(request).await
    }
}

/// Chain that returns a canned reply without calling any model.
///
/// Used when no API key is configured, and by tests and benchmarks.
pub struct FixedChain {
    reply: String,
}

impl FixedChain {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ReplyChain for FixedChain {
    async fn generate(&self, _message: &str, _history: &[ChatMessage]) -> Result<String> {
        Ok(self.reply.clone())
    }
}

/// Factory producing [`FixedChain`]s
pub struct FixedChainFactory {
    reply: String,
}

impl FixedChainFactory {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ChainFactory for FixedChainFactory {
    async fn build(&self, _context: &UserContext) -> Result<Arc<dyn ReplyChain>> {
        Ok(Arc::new(FixedChain::new(self.reply.clone())))
    }
}

/// In-memory context source
///
/// Unknown users resolve to an anonymous context rather than an error, so a
/// missing profile never blocks a conversation.
#[derive(Default)]
pub struct StaticContextSource {
    contexts: HashMap<String, UserContext>,
}

impl StaticContextSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user context, keyed by its user id
    pub fn with_context(mut self, context: UserContext) -> Self {
        self.contexts.insert(context.user_id.clone(), context);
        self
    }
}

#[async_trait]
impl ContextSource for StaticContextSource {
    async fn user_context(&self, user_id: &str) -> Result<UserContext> {
        Ok(self
            .contexts
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserContext::anonymous(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_anonymous() {
        let prompt = build_system_prompt(&UserContext::anonymous("u1"));
        assert!(prompt.contains("wellness companion"));
        assert!(!prompt.contains("name is"));
    }

    #[test]
    fn test_system_prompt_with_profile_and_moods() {
        let context = UserContext {
            user_id: "u1".to_string(),
            display_name: Some("Asha".to_string()),
            mood_summary: Some("stressed about exams most of the week".to_string()),
        };

        let prompt = build_system_prompt(&context);
        assert!(prompt.contains("The user's name is Asha."));
        assert!(prompt.contains("stressed about exams"));
    }

    #[tokio::test]
    async fn test_fixed_chain_factory() {
        let factory = FixedChainFactory::new("echo");
        let chain = factory.build(&UserContext::anonymous("u1")).await.unwrap();
        let reply = chain.generate("hi", &[]).await.unwrap();
        assert_eq!(reply, "echo");
    }

    #[tokio::test]
    async fn test_static_context_source() {
        let source = StaticContextSource::new().with_context(UserContext {
            user_id: "u1".to_string(),
            display_name: Some("Asha".to_string()),
            mood_summary: None,
        });

        let known = source.user_context("u1").await.unwrap();
        assert_eq!(known.display_name.as_deref(), Some("Asha"));

        let unknown = source.user_context("u2").await.unwrap();
        assert_eq!(unknown.user_id, "u2");
        assert!(unknown.display_name.is_none());
    }
}
