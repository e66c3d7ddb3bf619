//! Provider resolution from credentials and configuration

use crate::config::{non_empty, BridgeConfig, ProviderCredentials, DEFAULT_PROVIDER};
use std::fmt;

/// Embedding width of OpenAI `text-embedding-3-small`
pub const OPENAI_EMBEDDING_DIM: usize = 1536;

/// Embedding width of Google `text-embedding-004`, also used by the fallback
pub const GOOGLE_EMBEDDING_DIM: usize = 768;

/// Embedding provider chosen for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvedProvider {
    OpenAi,
    Google,
    Fallback,
}

impl ResolvedProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the embedding provider. First matching rule wins; never fails.
///
/// Anthropic has no embedding endpoint, so preferring it defers to
/// whichever of OpenAI or Google has credentials.
pub fn resolve_embedding_provider(creds: &ProviderCredentials) -> ResolvedProvider {
    match creds.preferred.as_str() {
        "openai" if creds.has_openai() => ResolvedProvider::OpenAi,
        "anthropic" => {
            if creds.has_openai() {
                ResolvedProvider::OpenAi
            } else if creds.has_google() {
                ResolvedProvider::Google
            } else {
                ResolvedProvider::Fallback
            }
        }
        _ if creds.has_google() => ResolvedProvider::Google,
        _ if creds.has_openai() => ResolvedProvider::OpenAi,
        _ => ResolvedProvider::Fallback,
    }
}

/// Vector width for a provider. Downstream storage is sized from this alone.
pub fn embedding_dimension(provider: ResolvedProvider) -> usize {
    match provider {
        ResolvedProvider::OpenAi => OPENAI_EMBEDDING_DIM,
        ResolvedProvider::Google | ResolvedProvider::Fallback => GOOGLE_EMBEDDING_DIM,
    }
}

/// Completion provider label and model name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTarget {
    pub provider: String,
    pub model: Option<String>,
}

/// Completion provider selection: configured label, no credential cascade
pub fn resolve_completion_target(config: &BridgeConfig) -> CompletionTarget {
    let provider = non_empty(config.model_provider.as_deref())
        .or_else(|| non_empty(Some(config.default_llm_provider.as_str())))
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
        .to_lowercase();

    CompletionTarget {
        provider,
        model: non_empty(config.model_name.as_deref()),
    }
}
