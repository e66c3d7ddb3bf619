//! OpenAI (and OpenAI-compatible) embeddings and chat completions

use super::stream::sse_text_stream;
use super::{
    build_http_client, check_status, ChatMessage, ChatProvider, ChatResponse, EmbeddingProvider,
    InvokeOptions, TextStream,
};
use crate::config::{non_empty, BridgeConfig};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// OpenAI embeddings endpoint client
pub struct OpenAiEmbedder {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Create from configuration; fails when no API key is set
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let api_key = non_empty(config.openai_api_key.as_deref())
            .ok_or_else(|| BridgeError::Config("OPENAI_API_KEY is not configured".to_string()))?;
        Self::new(
            api_key,
            config.openai_embedding_model.clone(),
            config.openai_base_url.clone(),
            config.timeout_secs,
        )
    }

    /// Only the text-embedding-3 family accepts a requested width
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }

    fn build_request<'a>(&'a self, texts: &'a [String], dimensions: usize) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            input: texts,
            dimensions: self.supports_dimensions().then_some(dimensions),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String], dimensions: usize) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        tracing::debug!("OpenAI embeddings: {} texts via {}", texts.len(), self.model);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(texts, dimensions))
            .send()
            .await?;

        let mut parsed: EmbedResponse = check_status("OpenAI", response).await?.json().await?;
        parsed.data.sort_by_key(|d| d.index);

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI chat completions adapter
pub struct OpenAiChat {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl OpenAiChat {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model_name: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: model_name.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        })
    }

    /// Create from configuration. A missing key is only reported by the API.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Self::new(
            non_empty(config.openai_api_key.as_deref()).unwrap_or_default(),
            config.openai_base_url.clone(),
            non_empty(config.model_name.as_deref()),
            config.timeout_secs,
        )
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &'a InvokeOptions,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.default_model),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        check_status("OpenAI", response).await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<ChatResponse> {
        let request = self.build_request(messages, options);
        let completion: ChatCompletion = self.send(&request).await?.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::Llm("No response from LLM".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default().trim().to_string(),
            provider: self.provider_name().to_string(),
            model: request.model.to_string(),
            usage: completion.usage,
            finish_reason: choice.finish_reason,
        })
    }

    async fn stream(&self, messages: &[ChatMessage], options: &InvokeOptions) -> Result<TextStream> {
        let mut request = self.build_request(messages, options);
        request.stream = true;

        let response = self.send(&request).await?;
        Ok(sse_text_stream(response.bytes_stream(), stream_delta))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// `choices[0].delta.content` of one `chat.completion.chunk`; `[DONE]` ends the stream
fn stream_delta(data: &str) -> Result<Option<String>> {
    if data == "[DONE]" {
        return Ok(None);
    }

    let chunk: serde_json::Value = serde_json::from_str(data)?;
    if let Some(error) = chunk.get("error") {
        return Err(BridgeError::ExternalError(format!(
            "OpenAI stream error: {}",
            error["message"].as_str().unwrap_or("unknown error")
        )));
    }

    Ok(chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|text| !text.is_empty())
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::stream::test_support::replay;

    #[test]
    fn test_embed_request_includes_dimensions_for_v3() {
        let embedder =
            OpenAiEmbedder::new("k", "text-embedding-3-small", "https://api.openai.com/v1/", 5)
                .unwrap();
        let texts = vec!["a".to_string()];
        let json = serde_json::to_value(embedder.build_request(&texts, 768)).unwrap();
        assert_eq!(json["dimensions"], 768);
        assert_eq!(json["input"][0], "a");
        assert_eq!(embedder.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_embed_request_omits_dimensions_for_ada() {
        let embedder =
            OpenAiEmbedder::new("k", "text-embedding-ada-002", "https://api.openai.com/v1", 5)
                .unwrap();
        let texts = vec!["a".to_string()];
        let json = serde_json::to_value(embedder.build_request(&texts, 1536)).unwrap();
        assert!(json.get("dimensions").is_none());
    }

    #[test]
    fn test_embedder_requires_key() {
        let config = BridgeConfig::empty();
        assert!(matches!(
            OpenAiEmbedder::from_config(&config),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_chat_request_model_override() {
        let chat = OpenAiChat::new("k", "https://api.openai.com/v1", None, 5).unwrap();
        assert_eq!(chat.default_model(), DEFAULT_CHAT_MODEL);

        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let options = InvokeOptions {
            model: Some("gpt-4o".to_string()),
            max_tokens: 60,
            temperature: 0.1,
        };
        let json = serde_json::to_value(chat.build_request(&messages, &options)).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 60);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
    }

    #[test]
    fn test_parse_embed_response_sorted_by_index() {
        let raw = r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#;
        let mut parsed: EmbedResponse = serde_json::from_str(raw).unwrap();
        parsed.data.sort_by_key(|d| d.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
    }

    #[test]
    fn test_stream_flag_only_when_streaming() {
        let chat = OpenAiChat::new("k", "https://api.openai.com/v1", None, 5).unwrap();
        let messages = vec![ChatMessage::user("u")];
        let options = InvokeOptions::default();

        let mut request = chat.build_request(&messages, &options);
        assert!(serde_json::to_value(&request).unwrap().get("stream").is_none());

        request.stream = true;
        assert_eq!(serde_json::to_value(&request).unwrap()["stream"], true);
    }

    #[tokio::test]
    async fn test_stream_deltas_from_recorded_chunks() {
        let chunks = [
            "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n",
            "\ndata: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ];

        let deltas: Vec<String> = replay(&chunks, stream_delta)
            .await
            .into_iter()
            .map(|d| d.unwrap())
            .collect();
        assert_eq!(deltas, vec!["Hel", "lo"]);
    }

    #[test]
    fn test_stream_error_event() {
        let err = stream_delta(r#"{"error":{"message":"rate limited"}}"#).unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
