//! Embedding client with provider cascade
//!
//! Order, first success wins:
//! 1. Google, when it is the resolved provider
//! 2. OpenAI, whenever an OpenAI key is present
//! 3. Local hash-based fallback
//!
//! Every attempt asks for the width of the provider resolved at the start of
//! the call, so all vectors returned match `embedding_dimension(resolved)`.

use super::{
    embedding_dimension, resolve_embedding_provider, BlockingBridge, Embedder, EmbeddingProvider,
    FallbackEmbedder, GoogleEmbedder, OpenAiEmbedder, ResolvedProvider,
};
use crate::config::{BridgeConfig, ProviderCredentials};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub struct EmbeddingClient {
    credentials: ProviderCredentials,
    google: Option<Arc<dyn EmbeddingProvider>>,
    openai: Option<Arc<dyn EmbeddingProvider>>,
    fallback: FallbackEmbedder,
    bridge: BlockingBridge,
}

impl EmbeddingClient {
    /// Create from configuration. Adapters that cannot be built are left
    /// out of the cascade.
    pub fn from_config(config: &BridgeConfig) -> Self {
        let credentials = config.credentials();

        let google = if credentials.has_google() {
            match GoogleEmbedder::from_config(config) {
                Ok(embedder) => Some(Arc::new(embedder) as Arc<dyn EmbeddingProvider>),
                Err(e) => {
                    tracing::warn!("Google embeddings unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let openai = if credentials.has_openai() {
            match OpenAiEmbedder::from_config(config) {
                Ok(embedder) => Some(Arc::new(embedder) as Arc<dyn EmbeddingProvider>),
                Err(e) => {
                    tracing::warn!("OpenAI embeddings unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self::with_providers(credentials, google, openai)
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::from_config(&BridgeConfig::from_env())
    }

    /// Create with explicit adapters
    pub fn with_providers(
        credentials: ProviderCredentials,
        google: Option<Arc<dyn EmbeddingProvider>>,
        openai: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self {
            credentials,
            google,
            openai,
            fallback: FallbackEmbedder::new(),
            bridge: BlockingBridge::new(),
        }
    }

    pub fn credentials(&self) -> &ProviderCredentials {
        &self.credentials
    }

    pub fn resolved_provider(&self) -> ResolvedProvider {
        resolve_embedding_provider(&self.credentials)
    }

    /// Embed texts. Never fails: the fallback always produces vectors.
    pub async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }

        let resolved = self.resolved_provider();
        let dimensions = embedding_dimension(resolved);

        if resolved == ResolvedProvider::Google && self.credentials.has_google() {
            if let Some(google) = &self.google {
                match attempt(google.as_ref(), texts, dimensions).await {
                    Ok(vectors) => return vectors,
                    Err(e) => tracing::warn!("Google embeddings failed: {}", e),
                }
            }
        }

        if self.credentials.has_openai() {
            if let Some(openai) = &self.openai {
                match attempt(openai.as_ref(), texts, dimensions).await {
                    Ok(vectors) => return vectors,
                    Err(e) => tracing::warn!("OpenAI embeddings failed: {}", e),
                }
            }
        }

        tracing::warn!("Using fallback hash-based embeddings - NOT for production!");
        self.fallback.embed_texts(texts, dimensions)
    }

    /// Blocking variant of [`EmbeddingClient::embed`]
    pub fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.bridge.run(self.embed(texts))
    }
}

/// Call one provider and check the response shape
async fn attempt(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
    let vectors = provider.embed_batch(texts, dimensions).await?;

    if vectors.len() != texts.len() {
        return Err(BridgeError::Provider(format!(
            "{} returned {} embeddings for {} texts",
            provider.provider_name(),
            vectors.len(),
            texts.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(BridgeError::Provider(format!(
            "{} returned {}-dimensional embeddings, expected {}",
            provider.provider_name(),
            bad.len(),
            dimensions
        )));
    }

    Ok(vectors)
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self.embed(texts).await)
    }

    fn dimensions(&self) -> usize {
        embedding_dimension(self.resolved_provider())
    }

    fn model_name(&self) -> &str {
        let provider = match self.resolved_provider() {
            ResolvedProvider::Google => self.google.as_deref(),
            ResolvedProvider::OpenAi => self.openai.as_deref(),
            ResolvedProvider::Fallback => None,
        };
        provider
            .map(|p| p.model_name())
            .unwrap_or_else(|| self.fallback.model_name())
    }
}
