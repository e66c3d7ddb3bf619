//! Google Generative AI (Gemini) and Vertex AI adapters
//!
//! Two auth modes:
//! - API key: `generativelanguage.googleapis.com`, key passed as a query parameter
//! - Vertex AI: project + location, bearer token from an [`AccessTokenSource`]

use super::stream::sse_text_stream;
use super::vertex_auth::{token_source_from_config, AccessTokenSource};
use super::{
    build_http_client, check_status, split_system, ChatMessage, ChatProvider, ChatResponse,
    EmbeddingProvider, InvokeOptions, Role, TextStream,
};
use crate::config::{non_empty, BridgeConfig};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const GENERATIVE_LANGUAGE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

/// How requests to Google are authenticated
#[derive(Clone)]
pub enum GoogleAuth {
    ApiKey(String),
    Vertex {
        project_id: String,
        location: String,
        tokens: Arc<dyn AccessTokenSource>,
    },
}

impl fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(..)"),
            Self::Vertex {
                project_id,
                location,
                tokens,
            } => f
                .debug_struct("Vertex")
                .field("project_id", project_id)
                .field("location", location)
                .field("tokens", &tokens.kind())
                .finish(),
        }
    }
}

impl GoogleAuth {
    /// API key wins over project id
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        if let Some(key) = non_empty(config.google_api_key.as_deref()) {
            return Ok(Self::ApiKey(key));
        }
        if let Some(project_id) = non_empty(config.model_project_id.as_deref()) {
            return Ok(Self::Vertex {
                project_id,
                location: config.model_location.trim().to_string(),
                tokens: token_source_from_config(config)?,
            });
        }
        Err(BridgeError::Config(
            "Google GenAI requires GOOGLE_API_KEY or MODEL_PROJECT_ID".to_string(),
        ))
    }

    /// Label for logs
    pub fn describe(&self) -> String {
        match self {
            Self::ApiKey(_) => "API key".to_string(),
            Self::Vertex {
                project_id,
                location,
                tokens,
            } => format!(
                "Vertex AI (project={}, location={}, {})",
                project_id,
                location,
                tokens.kind()
            ),
        }
    }

    fn vertex_model_url(project_id: &str, location: &str, model_id: &str, method: &str) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:{method}",
            loc = location,
            project = project_id,
            model = model_id,
            method = method,
        )
    }

    /// Attach credentials, fetching a Vertex token when needed
    async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        match self {
            Self::ApiKey(key) => Ok(request.query(&[("key", key)])),
            Self::Vertex { tokens, .. } => Ok(request.bearer_auth(tokens.access_token().await?)),
        }
    }
}

/// `models/text-embedding-004` -> `text-embedding-004`
fn model_id(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

/// Google embeddings client
pub struct GoogleEmbedder {
    http_client: reqwest::Client,
    auth: GoogleAuth,
    model: String,
}

impl GoogleEmbedder {
    pub fn new(auth: GoogleAuth, model: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            auth,
            model: model.into(),
        })
    }

    /// Create from configuration
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        Self::new(
            GoogleAuth::from_config(config)?,
            config.google_embedding_model.clone(),
            config.timeout_secs,
        )
    }

    fn endpoint(&self) -> String {
        match &self.auth {
            GoogleAuth::ApiKey(_) => format!(
                "{}/models/{}:batchEmbedContents",
                GENERATIVE_LANGUAGE_URL,
                model_id(&self.model)
            ),
            GoogleAuth::Vertex {
                project_id,
                location,
                ..
            } => GoogleAuth::vertex_model_url(project_id, location, model_id(&self.model), "predict"),
        }
    }

    fn build_body(&self, texts: &[String], dimensions: usize) -> serde_json::Value {
        match &self.auth {
            GoogleAuth::ApiKey(_) => {
                let model_path = format!("models/{}", model_id(&self.model));
                let requests: Vec<BatchEmbedItem> = texts
                    .iter()
                    .map(|text| BatchEmbedItem {
                        model: model_path.clone(),
                        content: Content {
                            role: None,
                            parts: vec![Part { text: text.clone() }],
                        },
                        output_dimensionality: dimensions,
                    })
                    .collect();
                serde_json::json!({ "requests": requests })
            }
            GoogleAuth::Vertex { .. } => {
                let instances: Vec<serde_json::Value> = texts
                    .iter()
                    .map(|text| serde_json::json!({ "content": text }))
                    .collect();
                serde_json::json!({
                    "instances": instances,
                    "parameters": { "outputDimensionality": dimensions },
                })
            }
        }
    }

    fn parse_body(&self, body: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        match &self.auth {
            GoogleAuth::ApiKey(_) => {
                let parsed: BatchEmbedResponse = serde_json::from_value(body)?;
                Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
            }
            GoogleAuth::Vertex { .. } => {
                let parsed: PredictResponse = serde_json::from_value(body)?;
                Ok(parsed
                    .predictions
                    .into_iter()
                    .map(|p| p.embeddings.values)
                    .collect())
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEmbedItem {
    model: String,
    content: Content,
    output_dimensionality: usize,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    embeddings: EmbeddingValues,
}

#[async_trait]
impl EmbeddingProvider for GoogleEmbedder {
    async fn embed_batch(&self, texts: &[String], dimensions: usize) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!("Google embeddings: {} texts via {}", texts.len(), self.model);

        let request = self
            .http_client
            .post(self.endpoint())
            .json(&self.build_body(texts, dimensions));
        let response = self.auth.authorize(request).await?.send().await?;

        let body: serde_json::Value = check_status("Google", response).await?.json().await?;
        self.parse_body(body)
    }

    fn provider_name(&self) -> &str {
        "google"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Gemini chat adapter (`generateContent`)
pub struct GoogleChat {
    http_client: reqwest::Client,
    auth: GoogleAuth,
    default_model: String,
}

impl GoogleChat {
    pub fn new(auth: GoogleAuth, model_name: Option<String>, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            auth,
            default_model: model_name.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
        })
    }

    /// Create from configuration; fails without an API key or project id
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let auth = GoogleAuth::from_config(config)?;
        tracing::info!("Google GenAI adapter using {}", auth.describe());
        Self::new(
            auth,
            non_empty(config.model_name.as_deref()),
            config.timeout_secs,
        )
    }

    /// `method` is `generateContent` or `streamGenerateContent`
    fn endpoint(&self, model: &str, method: &str) -> String {
        match &self.auth {
            GoogleAuth::ApiKey(_) => format!(
                "{}/models/{}:{}",
                GENERATIVE_LANGUAGE_URL,
                model_id(model),
                method
            ),
            GoogleAuth::Vertex {
                project_id,
                location,
                ..
            } => GoogleAuth::vertex_model_url(project_id, location, model_id(model), method),
        }
    }

    async fn send(
        &self,
        model: &str,
        method: &str,
        body: &GenerateRequest,
    ) -> Result<reqwest::Response> {
        let mut request = self.http_client.post(self.endpoint(model, method)).json(body);
        if method == "streamGenerateContent" {
            request = request.query(&[("alt", "sse")]);
        }
        let response = self.auth.authorize(request).await?.send().await?;
        check_status("Google", response).await
    }

    /// System turns become `systemInstruction`; assistant turns use the `model` role
    fn build_body(messages: &[ChatMessage], options: &InvokeOptions) -> GenerateRequest {
        let (system, rest) = split_system(messages);

        GenerateRequest {
            system_instruction: system.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            contents: rest
                .into_iter()
                .map(|msg| Content {
                    role: Some(
                        match msg.role {
                            Role::Assistant => "model",
                            _ => "user",
                        }
                        .to_string(),
                    ),
                    parts: vec![Part {
                        text: msg.content.clone(),
                    }],
                })
                .collect(),
            generation_config: GenerationConfig {
                max_output_tokens: options.max_tokens,
                temperature: options.temperature,
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[async_trait]
impl ChatProvider for GoogleChat {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<ChatResponse> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let body = Self::build_body(messages, options);

        let parsed: GenerateResponse = self
            .send(model, "generateContent", &body)
            .await?
            .json()
            .await?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::Llm("No candidates in Gemini response".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(ChatResponse {
            content: text.trim().to_string(),
            provider: self.provider_name().to_string(),
            model: model.to_string(),
            usage: parsed.usage_metadata,
            finish_reason: candidate.finish_reason,
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        options: &InvokeOptions,
    ) -> Result<TextStream> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let body = Self::build_body(messages, options);

        let response = self.send(model, "streamGenerateContent", &body).await?;
        Ok(sse_text_stream(response.bytes_stream(), stream_delta))
    }

    fn provider_name(&self) -> &str {
        "google_genai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

/// Text of one `streamGenerateContent` chunk; each chunk is a full `GenerateResponse`
fn stream_delta(data: &str) -> Result<Option<String>> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    if let Some(error) = value.get("error") {
        return Err(BridgeError::ExternalError(format!(
            "Gemini stream error: {}",
            error
        )));
    }

    let parsed: GenerateResponse = serde_json::from_value(value)?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    Ok(Some(text).filter(|t| !t.is_empty()))
}
