//! Text-generation provider abstraction
//!
//! Explanations and onboarding both need "prompt in, text out" from a hosted
//! model. The transport (timeouts, retries, auth) lives behind this trait;
//! what to do when it fails is decided by the callers.

use crate::error::AppResult;

pub mod groq;

pub use groq::{GroqProvider, RetryPolicy};

/// Trait for remote LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a single-turn prompt and returns the model's reply text
    ///
    /// Non-success statuses, transport failures and malformed bodies are all
    /// reported as errors.
    async fn complete(&self, prompt: &str) -> AppResult<String>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
