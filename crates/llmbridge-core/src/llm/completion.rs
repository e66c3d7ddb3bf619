//! Completion client
//!
//! Resolves the configured provider through the [`LlmGateway`] on first use
//! and keeps the handle for the lifetime of the client. Every failure is
//! surfaced as [`BridgeError::Completion`]; there is no fallback.

use super::{
    locate_json_body, resolve_completion_target, ChatMessage, ChatProvider, ChatResponse,
    InvokeOptions, LlmGateway, TextStream,
};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::OnceCell;

struct ProviderHandle {
    client: Arc<dyn ChatProvider>,
    options: InvokeOptions,
}

impl ProviderHandle {
    fn merge(&self, overrides: &InvokeOptions) -> InvokeOptions {
        InvokeOptions {
            model: overrides.model.clone().or_else(|| self.options.model.clone()),
            ..overrides.clone()
        }
    }
}

pub struct CompletionClient {
    config: BridgeConfig,
    gateway: Arc<LlmGateway>,
    handle: OnceCell<ProviderHandle>,
}

impl CompletionClient {
    /// Create a client backed by the process-wide gateway
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_gateway(config, LlmGateway::global())
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(BridgeConfig::from_env())
    }

    pub fn with_gateway(config: BridgeConfig, gateway: Arc<LlmGateway>) -> Self {
        Self {
            config,
            gateway,
            handle: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether the provider handle has been built
    pub fn is_connected(&self) -> bool {
        self.handle.initialized()
    }

    async fn handle(&self) -> Result<&ProviderHandle> {
        self.handle
            .get_or_try_init(|| async { self.connect() })
            .await
            .map_err(|e| {
                tracing::error!("Completion error: {}", e);
                BridgeError::completion(e)
            })
    }

    fn connect(&self) -> Result<ProviderHandle> {
        self.gateway.ensure_initialized(&self.config);

        let target = resolve_completion_target(&self.config);
        tracing::info!(
            "Constructing LLM via gateway: provider={}, model={}",
            target.provider,
            target.model.as_deref().unwrap_or("<default>")
        );

        let client = self.gateway.get_client(&target.provider)?;
        tracing::info!(
            "LLM client ready ({}, default model {})",
            client.provider_name(),
            client.default_model()
        );

        Ok(ProviderHandle {
            client,
            options: InvokeOptions {
                model: target.model,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        })
    }

    /// Options every call starts from: configured model, `max_tokens`, temperature
    pub async fn default_options(&self) -> Result<InvokeOptions> {
        Ok(self.handle().await?.options.clone())
    }

    /// Send an explicit conversation
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        let handle = self.handle().await?;
        self.send(handle, messages, &handle.options).await
    }

    /// Send a conversation with per-call options; an unset model keeps the configured one
    pub async fn chat_with(
        &self,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<ChatResponse> {
        let handle = self.handle().await?;
        let options = handle.merge(options);
        self.send(handle, messages, &options).await
    }

    async fn send(
        &self,
        handle: &ProviderHandle,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<ChatResponse> {
        handle
            .client
            .invoke(messages, options)
            .await
            .map_err(|e| {
                tracing::error!("Completion error: {}", e);
                BridgeError::completion(e)
            })
    }

    /// Stream a conversation as text deltas
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<TextStream> {
        let options = self.handle().await?.options.clone();
        self.stream_with(messages, &options).await
    }

    /// Stream with per-call options.
    ///
    /// Errors while opening the stream and errors inside it are both
    /// wrapped as [`BridgeError::Completion`].
    pub async fn stream_with(
        &self,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<TextStream> {
        let handle = self.handle().await?;
        let options = handle.merge(options);

        let stream = handle
            .client
            .stream(messages, &options)
            .await
            .map_err(|e| {
                tracing::error!("Completion error: {}", e);
                BridgeError::completion(e)
            })?;

        Ok(stream
            .map(|delta| {
                delta.map_err(|e| {
                    tracing::error!("Completion stream error: {}", e);
                    BridgeError::completion(e)
                })
            })
            .boxed())
    }

    /// Send `prompt` after an optional system instruction and prior turns.
    ///
    /// With `extract_json`, the span from the first `{` to the last `}` is
    /// returned when there is one; otherwise the text comes back unchanged.
    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        history: &[ChatMessage],
        extract_json: bool,
    ) -> Result<String> {
        let messages = build_messages(prompt, system_prompt, history);
        let text = self.chat(&messages).await?.content;

        if extract_json {
            if let Some(body) = locate_json_body(&text) {
                return Ok(body.to_string());
            }
        }

        Ok(text)
    }
}

/// System instruction (if non-empty), then history, then the user prompt
pub fn build_messages(
    prompt: &str,
    system_prompt: Option<&str>,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);

    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(prompt));

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a fixed reply and records what it was sent
    struct ScriptedChat {
        reply: std::result::Result<String, String>,
        seen: Mutex<Vec<(Vec<ChatMessage>, InvokeOptions)>>,
    }

    impl ScriptedChat {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedChat {
        async fn invoke(
            &self,
            messages: &[ChatMessage],
            options: &InvokeOptions,
        ) -> Result<ChatResponse> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), options.clone()));
            match &self.reply {
                Ok(text) => Ok(ChatResponse {
                    content: text.clone(),
                    provider: "scripted".to_string(),
                    model: options.model.clone().unwrap_or_default(),
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                }),
                Err(message) => Err(BridgeError::Provider(message.clone())),
            }
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-1"
        }
    }

    /// Streams fixed chunks; `Err` entries become failed deltas
    struct ChunkedChat {
        chunks: Vec<std::result::Result<&'static str, &'static str>>,
    }

    #[async_trait]
    impl ChatProvider for ChunkedChat {
        async fn invoke(
            &self,
            _messages: &[ChatMessage],
            _options: &InvokeOptions,
        ) -> Result<ChatResponse> {
            Err(BridgeError::Provider("use stream".to_string()))
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
            _options: &InvokeOptions,
        ) -> Result<TextStream> {
            let items: Vec<Result<String>> = self
                .chunks
                .iter()
                .map(|c| match c {
                    Ok(text) => Ok(text.to_string()),
                    Err(message) => Err(BridgeError::ExternalError(message.to_string())),
                })
                .collect();
            Ok(futures::stream::iter(items).boxed())
        }

        fn provider_name(&self) -> &str {
            "chunked"
        }

        fn default_model(&self) -> &str {
            "chunked-1"
        }
    }

    fn client_with(provider: &str, adapter: Arc<dyn ChatProvider>) -> CompletionClient {
        let mut config = BridgeConfig::empty();
        config.model_provider = Some(provider.to_string());
        config.supported_llm_providers = Vec::new();

        let gateway = Arc::new(LlmGateway::new());
        gateway.register_adapter(provider, adapter);
        CompletionClient::with_gateway(config, gateway)
    }

    #[test]
    fn test_build_messages_order() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let messages = build_messages("next?", Some("be brief"), &history);

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[3].content, "next?");
    }

    #[test]
    fn test_build_messages_skips_empty_system() {
        let messages = build_messages("q", Some(""), &[]);
        assert_eq!(messages, vec![ChatMessage::user("q")]);
        assert_eq!(build_messages("q", None, &[]).len(), 1);
    }

    #[tokio::test]
    async fn test_complete_sends_conversation_and_options() {
        let adapter = ScriptedChat::replying("Yes.");
        let mut client = client_with("openai", adapter.clone());
        client.config.model_name = Some("gpt-4o".to_string());
        client.config.max_tokens = 60;

        let text = client
            .complete("Is water wet?", Some("Answer briefly"), &[], false)
            .await
            .unwrap();
        assert_eq!(text, "Yes.");

        let seen = adapter.seen.lock().unwrap();
        let (messages, options) = &seen[0];
        assert_eq!(messages[0], ChatMessage::system("Answer briefly"));
        assert_eq!(messages[1], ChatMessage::user("Is water wet?"));
        assert_eq!(options.model.as_deref(), Some("gpt-4o"));
        assert_eq!(options.max_tokens, 60);
    }

    #[tokio::test]
    async fn test_extract_json_returns_body() {
        let client = client_with("openai", ScriptedChat::replying(r#"noise {"a":1} noise"#));
        let text = client.complete("q", None, &[], true).await.unwrap();
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_extract_json_without_braces_returns_full_text() {
        let client = client_with("openai", ScriptedChat::replying("Yes."));
        let text = client.complete("q", None, &[], true).await.unwrap();
        assert_eq!(text, "Yes.");
    }

    #[tokio::test]
    async fn test_provider_error_is_wrapped() {
        let client = client_with("anthropic", ScriptedChat::failing("boom"));
        let err = client.complete("q", None, &[], false).await.unwrap_err();

        assert!(matches!(err, BridgeError::Completion { kind: "Provider", .. }));
        let msg = err.to_string();
        assert!(msg.contains("Provider"));
        assert!(msg.contains("boom"));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_fatal() {
        let mut config = BridgeConfig::empty();
        config.model_provider = Some("cohere".to_string());
        config.supported_llm_providers = Vec::new();
        let client = CompletionClient::with_gateway(config, Arc::new(LlmGateway::new()));

        let err = client.complete("q", None, &[], false).await.unwrap_err();
        assert!(matches!(err, BridgeError::Completion { kind: "Config", .. }));
        assert!(err.to_string().contains("cohere"));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_alias_resolves_to_registered_adapter() {
        let adapter = ScriptedChat::replying("ok");
        let mut client = client_with("google_genai", adapter.clone());
        client.config.model_provider = Some("Gemini".to_string());

        assert_eq!(client.complete("q", None, &[], false).await.unwrap(), "ok");
        assert_eq!(adapter.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_with_overrides_keep_configured_model() {
        let adapter = ScriptedChat::replying("Fine.");
        let mut client = client_with("openai", adapter.clone());
        client.config.model_name = Some("gpt-4o".to_string());

        let defaults = client.default_options().await.unwrap();
        assert_eq!(defaults.max_tokens, 1024);

        let options = InvokeOptions {
            max_tokens: 60,
            ..InvokeOptions::default()
        };
        client
            .chat_with(&[ChatMessage::user("How are you?")], &options)
            .await
            .unwrap();

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[0].1.max_tokens, 60);
        assert_eq!(seen[0].1.model.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_chat_with_explicit_model_wins() {
        let adapter = ScriptedChat::replying("ok");
        let mut client = client_with("anthropic", adapter.clone());
        client.config.model_name = Some("claude-a".to_string());

        let options = InvokeOptions {
            model: Some("claude-b".to_string()),
            ..InvokeOptions::default()
        };
        let response = client.chat_with(&[ChatMessage::user("q")], &options).await.unwrap();
        assert_eq!(response.model, "claude-b");

        client.chat(&[ChatMessage::user("q")]).await.unwrap();
        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[1].1.model.as_deref(), Some("claude-a"));
    }

    #[tokio::test]
    async fn test_stream_collects_deltas() {
        let adapter = Arc::new(ChunkedChat {
            chunks: vec![Ok("Hel"), Ok("lo")],
        });
        let client = client_with("openai", adapter);

        let text: Vec<String> = client
            .stream(&build_messages("hi", None, &[]))
            .await
            .unwrap()
            .map(|d| d.unwrap())
            .collect()
            .await;
        assert_eq!(text.concat(), "Hello");
    }

    #[tokio::test]
    async fn test_stream_failures_are_wrapped() {
        let adapter = Arc::new(ChunkedChat {
            chunks: vec![Ok("Hel"), Err("connection reset")],
        });
        let client = client_with("openai", adapter);

        let items: Vec<Result<String>> = client
            .stream(&[ChatMessage::user("hi")])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items[0].as_ref().unwrap(), "Hel");
        assert!(matches!(
            items[1],
            Err(BridgeError::Completion { kind: "ExternalError", .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_unknown_provider_is_completion_error() {
        let mut config = BridgeConfig::empty();
        config.model_provider = Some("cohere".to_string());
        config.supported_llm_providers = Vec::new();
        let client = CompletionClient::with_gateway(config, Arc::new(LlmGateway::new()));

        let err = client.stream(&[ChatMessage::user("q")]).await.err().unwrap();
        assert!(matches!(err, BridgeError::Completion { kind: "Config", .. }));
    }

    #[tokio::test]
    async fn test_default_stream_falls_back_to_whole_reply() {
        let client = client_with("openai", ScriptedChat::replying("all at once"));
        let items: Vec<Result<String>> = client
            .stream(&[ChatMessage::user("q")])
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), "all at once");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_handle_built_once_under_concurrency() {
        let adapter = ScriptedChat::replying("ok");
        let client = Arc::new(client_with("openai", adapter.clone()));
        assert!(!client.is_connected());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let client = client.clone();
                tokio::spawn(async move { client.complete(&format!("q{}", i), None, &[], false).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "ok");
        }

        assert!(client.is_connected());
        assert!(client.gateway.is_initialized());
        assert_eq!(adapter.seen.lock().unwrap().len(), 8);
    }
}
