//! Anthropic Messages API adapter (completion only, no embeddings)

use super::stream::sse_text_stream;
use super::{
    build_http_client, check_status, split_system, ChatMessage, ChatProvider, ChatResponse,
    InvokeOptions, TextStream,
};
use crate::config::{non_empty, BridgeConfig};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const DEFAULT_CHAT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicChat {
    http_client: reqwest::Client,
    api_key: String,
    default_model: String,
}

impl AnthropicChat {
    pub fn new(
        api_key: impl Into<String>,
        model_name: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            api_key: api_key.into(),
            default_model: model_name.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        })
    }

    /// Create from configuration. A missing key is only reported by the API.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Self::new(
            non_empty(config.anthropic_api_key.as_deref()).unwrap_or_default(),
            non_empty(config.model_name.as_deref()),
            config.timeout_secs,
        )
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &'a InvokeOptions,
    ) -> MessagesRequest<'a> {
        let (system, rest) = split_system(messages);

        MessagesRequest {
            model: options.model.as_deref().unwrap_or(&self.default_model),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system,
            messages: rest,
            stream: false,
        }
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        check_status("Anthropic", response).await
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a ChatMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn join_text_blocks(blocks: Vec<ContentBlock>) -> String {
    blocks
        .into_iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text)
        .collect()
}

/// Text of a `content_block_delta` event; `error` events surface as stream errors
fn stream_delta(data: &str) -> Result<Option<String>> {
    let event: serde_json::Value = serde_json::from_str(data)?;

    match event["type"].as_str() {
        Some("content_block_delta") => Ok(event["delta"]["text"]
            .as_str()
            .filter(|text| !text.is_empty())
            .map(str::to_string)),
        Some("error") => Err(BridgeError::ExternalError(format!(
            "Anthropic stream error: {}",
            event["error"]["message"].as_str().unwrap_or("unknown error")
        ))),
        _ => Ok(None),
    }
}

#[async_trait]
impl ChatProvider for AnthropicChat {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<ChatResponse> {
        let request = self.build_request(messages, options);
        let parsed: MessagesResponse = self.send(&request).await?.json().await?;

        Ok(ChatResponse {
            content: join_text_blocks(parsed.content).trim().to_string(),
            provider: self.provider_name().to_string(),
            model: request.model.to_string(),
            usage: parsed.usage,
            finish_reason: parsed.stop_reason,
        })
    }

    async fn stream(&self, messages: &[ChatMessage], options: &InvokeOptions) -> Result<TextStream> {
        let mut request = self.build_request(messages, options);
        request.stream = true;

        let response = self.send(&request).await?;
        Ok(sse_text_stream(response.bytes_stream(), stream_delta))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
