//! llmbridge Core Library
//!
//! One stable interface for text completion and text embedding over
//! interchangeable model providers.
//!
//! # Features
//! - Deterministic provider resolution from partial credentials
//! - Embedding cascade (Google, OpenAI) with a local hash-based fallback
//! - Batched embedding with retry, backoff and zero-vector degradation
//! - Completion through a provider gateway (OpenAI, Google, Anthropic),
//!   whole or streamed
//! - Blocking entry points usable with or without an ambient tokio runtime

pub mod config;
pub mod error;
pub mod llm;

pub use config::{BridgeConfig, LlmProvider, ProviderCredentials};
pub use error::{BridgeError, Error, Result};
pub use llm::{
    build_messages, embed_with_retry, embedding_dimension, fallback_vector, locate_json_body,
    resolve_completion_target, resolve_embedding_provider, AccessTokenSource, BatchEmbedDriver,
    BlockingBridge, ChatMessage, ChatProvider, ChatResponse, CompletionClient, CompletionTarget,
    Embedder, EmbeddingBatch, EmbeddingClient, EmbeddingProvider, FallbackEmbedder,
    InvokeOptions, LlmGateway, ResolvedProvider, RetryPolicy, Role, TextStream,
};
