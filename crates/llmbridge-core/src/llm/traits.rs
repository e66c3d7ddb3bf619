//! LLM trait definitions

use super::TextStream;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Embedding generation trait
///
/// Implemented by anything the batch driver can push text through.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::Llm("No embedding returned".to_string()))
    }

    /// Generate embeddings for batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// A single embedding backend
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch, asking the backend for vectors of `dimensions` width
    async fn embed_batch(&self, texts: &[String], dimensions: usize) -> Result<Vec<Vec<f32>>>;

    /// Provider label used in logs
    fn provider_name(&self) -> &str;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// A single chat completion backend
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the conversation and wait for one response
    async fn invoke(&self, messages: &[ChatMessage], options: &InvokeOptions)
        -> Result<ChatResponse>;

    /// Stream the response as text deltas.
    ///
    /// Backends without a streaming endpoint yield the whole response once.
    async fn stream(&self, messages: &[ChatMessage], options: &InvokeOptions) -> Result<TextStream> {
        let response = self.invoke(messages, options).await?;
        Ok(futures::stream::once(async move { Ok(response.content) }).boxed())
    }

    /// Provider label (e.g. "openai")
    fn provider_name(&self) -> &str;

    /// Model used when the options don't name one
    fn default_model(&self) -> &str;
}

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Chat message for completion requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    /// Overrides the adapter's default model
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: 0.1,
        }
    }
}

/// Response from a chat provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Concatenate all system turns; returns the joined instruction and the rest
pub(crate) fn split_system(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let mut system = String::new();
    let mut rest = Vec::with_capacity(messages.len());

    for msg in messages {
        if msg.role == Role::System {
            if !system.is_empty() {
                system.push('\n');
            }
            system.push_str(&msg.content);
        } else {
            rest.push(msg);
        }
    }

    let system = if system.is_empty() { None } else { Some(system) };
    (system, rest)
}
