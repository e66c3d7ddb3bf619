//! Error types for llmbridge

use thiserror::Error;

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error type alias for convenience
pub type Error = BridgeError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for llmbridge
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("External service error: {0}")]
    ExternalError(String),

    /// Fatal completion failure, wrapping the error raised by the provider
    #[error("LLM call failed ({kind}): {source}. Check your API keys and provider configuration")]
    Completion {
        kind: &'static str,
        #[source]
        source: Box<BridgeError>,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl BridgeError {
    /// Name of the error variant, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "Io",
            Self::Llm(_) => "Llm",
            Self::Config(_) => "Config",
            Self::Provider(_) => "Provider",
            Self::Serialization(_) => "Serialization",
            Self::Http(_) => "Http",
            Self::Regex(_) => "Regex",
            Self::InvalidInput(_) => "InvalidInput",
            Self::ExternalError(_) => "ExternalError",
            Self::Completion { .. } => "Completion",
            Self::Other(_) => "Other",
        }
    }

    /// Wrap an error raised while talking to a completion provider
    pub fn completion(source: BridgeError) -> Self {
        Self::Completion {
            kind: source.kind(),
            source: Box::new(source),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::InvalidInput(_) => exit_codes::INVALID_INPUT,
            Self::Completion { source, .. } => source.exit_code(),
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}
