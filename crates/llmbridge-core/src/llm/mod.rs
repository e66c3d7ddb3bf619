//! LLM integration
//!
//! Provides traits and implementations for:
//! - Embedding generation via Google GenAI and OpenAI, with a local fallback
//! - Batched embedding with retry
//! - Chat completion through a provider gateway (OpenAI, Google, Anthropic),
//!   whole or streamed as text deltas

mod anthropic;
mod batch;
mod blocking;
mod completion;
mod embedding;
mod fallback;
mod gateway;
mod google;
mod json;
mod openai;
mod resolver;
mod stream;
mod traits;
mod vertex_auth;

pub use anthropic::AnthropicChat;
pub use batch::{
    embed_with_retry, BatchEmbedDriver, EmbeddingBatch, RetryPolicy, DEFAULT_BATCH_SIZE,
};
pub use blocking::BlockingBridge;
pub use completion::{build_messages, CompletionClient};
pub use embedding::EmbeddingClient;
pub use fallback::{fallback_vector, FallbackEmbedder};
pub use gateway::LlmGateway;
pub use google::{GoogleAuth, GoogleChat, GoogleEmbedder};
pub use json::locate_json_body;
pub use openai::{OpenAiChat, OpenAiEmbedder};
pub use resolver::{
    embedding_dimension, resolve_completion_target, resolve_embedding_provider, CompletionTarget,
    ResolvedProvider, GOOGLE_EMBEDDING_DIM, OPENAI_EMBEDDING_DIM,
};
pub use stream::TextStream;
pub use traits::*;
pub use vertex_auth::{
    token_source_from_config, AccessTokenSource, AdcTokens, ServiceAccountTokens, StaticToken,
    CLOUD_PLATFORM_SCOPE,
};

use crate::error::{BridgeError, Result};
use std::time::Duration;

pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(BridgeError::Http)
}

/// Pass 2xx responses through, turn anything else into an error carrying the body
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(BridgeError::ExternalError(format!(
        "{} API error (HTTP {}): {}",
        provider, status, body
    )))
}
