use std::path::PathBuf;

use serde::Deserialize;

use crate::services::recommendations::VariantAssignment;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the MovieLens `u.user`, `u.item` and `u.data` files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory the interaction CSV logs are appended to
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Bearer token for the chat-completions endpoint. Not validated up front.
    #[serde(default)]
    pub groq_api_key: Option<String>,

    #[serde(default = "default_llm_api_url")]
    pub llm_api_url: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_llm_max_tokens")]
    pub llm_max_tokens: u32,

    #[serde(default = "default_llm_temperature")]
    pub llm_temperature: f32,

    /// Per-attempt request timeout for the LLM call
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Extra attempts after the first one on retryable failures
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: u32,

    /// How a request is bucketed into a model variant
    #[serde(default)]
    pub variant_assignment: VariantAssignment,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_llm_api_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "llama3-70b-8192".to_string()
}

fn default_llm_max_tokens() -> u32 {
    60
}

fn default_llm_temperature() -> f32 {
    0.7
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_llm_max_retries() -> u32 {
    2
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.llm_model, "llama3-70b-8192");
        assert_eq!(config.llm_max_tokens, 60);
        assert_eq!(config.llm_max_retries, 2);
        assert!(config.groq_api_key.is_none());
        assert_eq!(config.variant_assignment, VariantAssignment::Random);
    }

    #[test]
    fn test_overrides_from_environment() {
        let vars = vec![
            ("PORT".to_string(), "9090".to_string()),
            ("GROQ_API_KEY".to_string(), "gsk_test".to_string()),
            ("VARIANT_ASSIGNMENT".to_string(), "sticky".to_string()),
            ("LOG_DIR".to_string(), "/var/log/recsys".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.groq_api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.variant_assignment, VariantAssignment::Sticky);
        assert_eq!(config.log_dir, PathBuf::from("/var/log/recsys"));
    }
}
