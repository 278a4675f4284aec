//! Groq chat-completions provider
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol, so any endpoint
//! with the same shape can be configured through `LLM_API_URL`.

use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::providers::LlmProvider,
};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts made after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Outcome of a single HTTP attempt
enum AttemptError {
    Retryable(AppError),
    Fatal(AppError),
}

#[derive(Clone)]
pub struct GroqProvider {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

impl GroqProvider {
    pub fn new(
        api_key: Option<String>,
        api_url: String,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            model,
            max_tokens: 60,
            temperature: 0.7,
            retry,
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        if config.groq_api_key.is_none() {
            tracing::warn!("GROQ_API_KEY is not set; LLM calls will fall back to canned text");
        }

        let provider = Self::new(
            config.groq_api_key.clone(),
            config.llm_api_url.clone(),
            config.llm_model.clone(),
            Duration::from_secs(config.llm_timeout_secs),
            RetryPolicy {
                max_retries: config.llm_max_retries,
                ..RetryPolicy::default()
            },
        )?
        .with_sampling(config.llm_max_tokens, config.llm_temperature);

        Ok(provider)
    }

    /// Overrides the token budget and temperature sent with every prompt
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    async fn send_once(&self, body: &ChatCompletionRequest<'_>) -> Result<String, AttemptError> {
        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(self.api_key.as_deref().unwrap_or_default())
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = AppError::ExternalApi(format!(
                "Groq API returned status {}: {}",
                status, text
            ));
            return if is_retryable_status(status) {
                Err(AttemptError::Retryable(err))
            } else {
                Err(AttemptError::Fatal(err))
            };
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(e.into()))?;

        extract_content(completion).map_err(AttemptError::Fatal)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn extract_content(completion: ChatCompletionResponse) -> AppResult<String> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| AppError::ExternalApi("Groq response contained no message".to_string()))
}

#[async_trait::async_trait]
impl LlmProvider for GroqProvider {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        let body = self.request_body(prompt);
        let mut retries = 0;

        loop {
            match self.send_once(&body).await {
                Ok(text) => {
                    tracing::info!(
                        provider = self.name(),
                        attempts = retries + 1,
                        chars = text.len(),
                        "LLM completion received"
                    );
                    return Ok(text);
                }
                Err(AttemptError::Retryable(e)) if retries < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retries);
                    tracing::warn!(
                        provider = self.name(),
                        retry = retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(AttemptError::Retryable(e)) | Err(AttemptError::Fatal(e)) => {
                    tracing::error!(provider = self.name(), error = %e, "LLM request failed");
                    return Err(e);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "groq"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    fn provider_for(url: String, max_retries: u32) -> GroqProvider {
        GroqProvider::new(
            Some("gsk_test".to_string()),
            url,
            "llama3-70b-8192".to_string(),
            Duration::from_secs(5),
            fast_retry(max_retries),
        )
        .unwrap()
    }

    /// Serves `router` on an ephemeral local port and returns its base URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    #[test]
    fn test_request_body_shape() {
        let provider = provider_for("http://test.local".to_string(), 0);
        let body = serde_json::to_value(provider.request_body("Explain Heat (1995)")).unwrap();

        assert_eq!(body["model"], "llama3-70b-8192");
        assert_eq!(body["max_tokens"], 60);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Explain Heat (1995)");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_extract_content_trims() {
        let completion: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "  A heist classic.\n"}}]
        }))
        .unwrap();
        assert_eq!(extract_content(completion).unwrap(), "A heist classic.");
    }

    #[test]
    fn test_extract_content_without_choices() {
        let completion: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            extract_content(completion),
            Err(AppError::ExternalApi(_))
        ));
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let provider = provider_for("http://127.0.0.1:1/v1/chat/completions".to_string(), 1);
        let result = provider.complete("hello").await;
        assert!(matches!(result, Err(AppError::HttpClient(_))));
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<Value>| {
                let counter = counter.clone();
                async move {
                    assert_eq!(body["messages"][0]["content"], "hello");
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (AxumStatus::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})))
                    } else {
                        (
                            AxumStatus::OK,
                            Json(json!({"choices": [{"message": {"content": "Hi there"}}]})),
                        )
                    }
                }
            }),
        );
        let provider = provider_for(serve(router).await, 2);

        assert_eq!(provider.complete("hello").await.unwrap(), "Hi there");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (AxumStatus::UNAUTHORIZED, "Invalid API Key")
                }
            }),
        );
        let provider = provider_for(serve(router).await, 3);

        let err = provider.complete("hello").await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Invalid API Key"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
