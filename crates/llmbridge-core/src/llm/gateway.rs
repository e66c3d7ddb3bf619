//! LLM gateway: registry of completion adapters keyed by provider label
//!
//! Adapters for the configured providers are registered once per gateway
//! by [`LlmGateway::ensure_initialized`]; later calls are no-ops.

use super::{
    AnthropicChat, ChatMessage, ChatProvider, ChatResponse, GoogleChat, InvokeOptions,
    OpenAiChat, TextStream,
};
use crate::config::{BridgeConfig, LlmProvider};
use crate::error::{BridgeError, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

lazy_static! {
    static ref GLOBAL_GATEWAY: Arc<LlmGateway> = Arc::new(LlmGateway::new());
}

#[derive(Default)]
pub struct LlmGateway {
    adapters: RwLock<HashMap<String, Arc<dyn ChatProvider>>>,
    initialized: OnceLock<()>,
}

impl LlmGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide gateway shared by default-constructed completion clients
    pub fn global() -> Arc<LlmGateway> {
        GLOBAL_GATEWAY.clone()
    }

    /// Register (or replace) the adapter for a provider label
    pub fn register_adapter(&self, provider: impl Into<String>, adapter: Arc<dyn ChatProvider>) {
        let provider = provider.into();
        if let Ok(mut adapters) = self.adapters.write() {
            tracing::info!("Registered LLM adapter: {}", provider);
            adapters.insert(provider, adapter);
        }
    }

    /// Registered provider labels, sorted
    pub fn registered_providers(&self) -> Vec<String> {
        let mut providers: Vec<String> = self
            .adapters
            .read()
            .map(|adapters| adapters.keys().cloned().collect())
            .unwrap_or_default();
        providers.sort();
        providers
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Register adapters for every supported provider, exactly once.
    /// Concurrent callers wait for the first one to finish.
    pub fn ensure_initialized(&self, config: &BridgeConfig) {
        self.initialized.get_or_init(|| self.register_supported(config));
    }

    fn register_supported(&self, config: &BridgeConfig) {
        tracing::info!(
            "Initializing LLM gateway (supported: [{}])",
            config.supported_llm_providers.join(", ")
        );

        for label in &config.supported_llm_providers {
            let provider: LlmProvider = match label.parse() {
                Ok(provider) => provider,
                Err(_) => {
                    tracing::warn!("Unknown provider \"{}\" - skipping", label);
                    continue;
                }
            };

            if self.contains(provider.as_str()) {
                continue;
            }

            match build_adapter(provider, config) {
                Ok(adapter) => self.register_adapter(provider.as_str(), adapter),
                Err(e) => tracing::error!(
                    "Failed to register adapter for \"{}\": {}",
                    provider,
                    e
                ),
            }
        }

        tracing::info!(
            "Registered adapters: [{}]",
            self.registered_providers().join(", ")
        );
    }

    fn contains(&self, provider: &str) -> bool {
        self.adapters
            .read()
            .map(|adapters| adapters.contains_key(provider))
            .unwrap_or(false)
    }

    /// Adapter for a provider label; aliases such as "gemini" are accepted
    pub fn get_client(&self, provider: &str) -> Result<Arc<dyn ChatProvider>> {
        let key = provider
            .parse::<LlmProvider>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|_| provider.trim().to_lowercase());

        let adapters = self
            .adapters
            .read()
            .map_err(|_| BridgeError::Llm("Gateway registry lock poisoned".to_string()))?;

        adapters.get(&key).cloned().ok_or_else(|| {
            let mut registered: Vec<&str> = adapters.keys().map(String::as_str).collect();
            registered.sort();
            BridgeError::Config(format!(
                "No adapter registered for provider \"{}\". Registered: [{}]",
                key,
                registered.join(", ")
            ))
        })
    }

    /// Run one completion on the named provider's adapter
    pub async fn invoke(
        &self,
        provider: &str,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<ChatResponse> {
        self.get_client(provider)?.invoke(messages, options).await
    }

    /// Stream one completion from the named provider's adapter
    pub async fn stream(
        &self,
        provider: &str,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<TextStream> {
        self.get_client(provider)?.stream(messages, options).await
    }
}

fn build_adapter(provider: LlmProvider, config: &BridgeConfig) -> Result<Arc<dyn ChatProvider>> {
    Ok(match provider {
        LlmProvider::OpenAi => Arc::new(OpenAiChat::from_config(config)?),
        LlmProvider::GoogleGenai => Arc::new(GoogleChat::from_config(config)?),
        LlmProvider::Anthropic => Arc::new(AnthropicChat::from_config(config)?),
    })
}
