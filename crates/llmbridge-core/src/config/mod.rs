//! Configuration management
//!
//! Every setting has an environment variable; `BridgeConfig::default()`
//! reads them once, the same way the completion and embedding paths
//! expect to see them.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provider label used when nothing is configured
pub const DEFAULT_PROVIDER: &str = "google_genai";

/// Supported completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    GoogleGenai,
    Anthropic,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 3] = [
        LlmProvider::OpenAi,
        LlmProvider::GoogleGenai,
        LlmProvider::Anthropic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::GoogleGenai => "google_genai",
            Self::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match clean(s).to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "google_genai" | "google" | "gemini" => Ok(Self::GoogleGenai),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(BridgeError::Config(format!(
                "Unknown LLM provider: \"{}\". Supported: openai, google_genai, anthropic",
                other
            ))),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Preferred provider label (drives both completion and embedding choice)
    #[serde(default)]
    pub model_provider: Option<String>,

    /// Completion provider used when `model_provider` is unset
    #[serde(default = "default_llm_provider")]
    pub default_llm_provider: String,

    /// Completion model name (adapter default when unset)
    #[serde(default)]
    pub model_name: Option<String>,

    /// Providers registered with the gateway
    #[serde(default = "default_supported_providers")]
    pub supported_llm_providers: Vec<String>,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default)]
    pub google_api_key: Option<String>,

    /// Google Cloud project id (Vertex AI mode)
    #[serde(default)]
    pub model_project_id: Option<String>,

    #[serde(default = "default_model_location")]
    pub model_location: String,

    /// OAuth access token for Vertex AI requests; overrides minted tokens
    #[serde(default)]
    pub google_access_token: Option<String>,

    /// Service account key (JSON text or a path to the key file) used to
    /// mint Vertex AI tokens; application default credentials otherwise
    #[serde(default)]
    pub model_service_account_json: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    #[serde(default = "default_google_embedding_model")]
    pub google_embedding_model: String,

    #[serde(default = "default_openai_embedding_model")]
    pub openai_embedding_model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model_provider: env("MODEL_PROVIDER"),
            default_llm_provider: default_llm_provider(),
            model_name: env("MODEL_NAME"),
            supported_llm_providers: default_supported_providers(),
            openai_api_key: env("OPENAI_API_KEY"),
            openai_base_url: default_openai_base_url(),
            google_api_key: env("GOOGLE_API_KEY"),
            model_project_id: env("MODEL_PROJECT_ID"),
            model_location: default_model_location(),
            google_access_token: env("GOOGLE_ACCESS_TOKEN"),
            model_service_account_json: env("MODEL_SERVICE_ACCOUNT_JSON"),
            anthropic_api_key: env("ANTHROPIC_API_KEY"),
            google_embedding_model: default_google_embedding_model(),
            openai_embedding_model: default_openai_embedding_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
        }
    }
}

impl BridgeConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Configuration with no credentials and no environment lookups
    pub fn empty() -> Self {
        Self {
            model_provider: None,
            default_llm_provider: DEFAULT_PROVIDER.to_string(),
            model_name: None,
            supported_llm_providers: LlmProvider::ALL
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            google_api_key: None,
            model_project_id: None,
            model_location: "us-central1".to_string(),
            google_access_token: None,
            model_service_account_json: None,
            anthropic_api_key: None,
            google_embedding_model: "models/text-embedding-004".to_string(),
            openai_embedding_model: "text-embedding-3-small".to_string(),
            max_tokens: 1024,
            temperature: 0.1,
            timeout_secs: 60,
        }
    }

    /// Snapshot of the credentials relevant to embedding provider resolution
    pub fn credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            preferred: non_empty(self.model_provider.as_deref())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
                .to_lowercase(),
            openai_api_key: non_empty(self.openai_api_key.as_deref()),
            google_api_key: non_empty(self.google_api_key.as_deref()),
            project_id: non_empty(self.model_project_id.as_deref()),
        }
    }

    /// Check that the active completion provider has a usable credential
    pub fn validate(&self) -> Result<()> {
        let target = crate::llm::resolve_completion_target(self);
        let provider: LlmProvider = target.provider.parse()?;

        match provider {
            LlmProvider::OpenAi => {
                if is_placeholder(self.openai_api_key.as_deref()) {
                    return Err(BridgeError::Config(
                        "OPENAI_API_KEY is not configured".to_string(),
                    ));
                }
            }
            LlmProvider::GoogleGenai => {
                let has_key = !is_placeholder(self.google_api_key.as_deref());
                let has_project = non_empty(self.model_project_id.as_deref()).is_some();
                if !has_key && !has_project {
                    return Err(BridgeError::Config(
                        "Google GenAI requires GOOGLE_API_KEY or MODEL_PROJECT_ID".to_string(),
                    ));
                }
            }
            LlmProvider::Anthropic => {
                if is_placeholder(self.anthropic_api_key.as_deref()) {
                    return Err(BridgeError::Config(
                        "ANTHROPIC_API_KEY is not configured".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Credentials snapshot read once per resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    /// Lowercased preferred provider label
    pub preferred: String,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub project_id: Option<String>,
}

impl ProviderCredentials {
    pub fn has_openai(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// Google is reachable with either an API key or a project id
    pub fn has_google(&self) -> bool {
        self.google_api_key.is_some() || self.project_id.is_some()
    }
}

/// Trim whitespace and surrounding double quotes
pub(crate) fn clean(value: &str) -> &str {
    value.trim().trim_matches('"')
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(clean)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_placeholder(value: Option<&str>) -> bool {
    match non_empty(value) {
        None => true,
        Some(v) => v == "your-api-key-here" || v == "not-set",
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn default_llm_provider() -> String {
    env("DEFAULT_LLM_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
}

fn default_supported_providers() -> Vec<String> {
    env("SUPPORTED_LLM_PROVIDERS")
        .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
        .unwrap_or_else(|| {
            LlmProvider::ALL
                .iter()
                .map(|p| p.as_str().to_string())
                .collect()
        })
}

fn default_openai_base_url() -> String {
    env("OPENAI_BASE_URL").unwrap_or_else(|| "https://api.openai.com/v1".to_string())
}

fn default_model_location() -> String {
    env("MODEL_LOCATION").unwrap_or_else(|| "us-central1".to_string())
}

fn default_google_embedding_model() -> String {
    env("GOOGLE_EMBEDDING_MODEL").unwrap_or_else(|| "models/text-embedding-004".to_string())
}

fn default_openai_embedding_model() -> String {
    env("OPENAI_EMBEDDING_MODEL").unwrap_or_else(|| "text-embedding-3-small".to_string())
}

fn default_max_tokens() -> u32 {
    env("LLM_MAX_TOKENS")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1024)
}

fn default_temperature() -> f32 {
    env("LLM_TEMPERATURE")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.1)
}

fn default_timeout() -> u64 {
    env("LLM_TIMEOUT_SECS")
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
