//! Text-completion service trait.
//!
//! The analysis pipeline treats the model as an opaque service: a prompt
//! goes in, free text comes out, with no structural guarantee. Concrete
//! HTTP clients (Workers AI, OpenAI) live in the `feedback-pulse` app crate.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Complete `prompt`, asking for at most `max_tokens` output tokens.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}
