//! Integration tests for the embedding pipeline
//!
//! Exercises the batch driver over scripted embedders and the real
//! embedding client with no credentials (fallback only).

use async_trait::async_trait;
use llmbridge_core::{
    embedding_dimension, fallback_vector, resolve_embedding_provider, BatchEmbedDriver,
    BridgeConfig, BridgeError, Embedder, EmbeddingClient, ProviderCredentials, ResolvedProvider,
    Result, RetryPolicy,
};
use std::sync::Mutex;
use std::time::Duration;

/// Encodes the first character of each text into the vector so row order
/// can be checked; fails every call whose batch starts with `poison`.
struct ScriptedEmbedder {
    dims: usize,
    poison: Option<String>,
    calls: Mutex<Vec<usize>>,
}

impl ScriptedEmbedder {
    fn new(dims: usize, poison: Option<&str>) -> Self {
        Self {
            dims,
            poison: poison.map(str::to_string),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().push(texts.len());

        if let (Some(poison), Some(first)) = (&self.poison, texts.first()) {
            if first == poison {
                return Err(BridgeError::ExternalError("HTTP 500".to_string()));
            }
        }

        Ok(texts
            .iter()
            .map(|t| {
                let id: f32 = t.trim_start_matches("t").parse().unwrap_or(-1.0);
                let mut v = vec![0.0; self.dims];
                v[0] = id + 1.0;
                v
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("t{}", i)).collect()
}

fn no_backoff(batch_size: usize) -> RetryPolicy {
    RetryPolicy::default()
        .with_batch_size(batch_size)
        .with_backoff_step(Duration::ZERO)
}

#[tokio::test]
async fn test_batches_are_sequential_and_ordered() {
    let driver = BatchEmbedDriver::with_policy(ScriptedEmbedder::new(8, None), no_backoff(50));
    let input = texts(120);

    let batch = driver.embed_all(&input).await;

    assert_eq!(driver.embedder().calls(), vec![50, 50, 20]);
    assert_eq!(batch.len(), 120);
    assert!(batch.degraded.is_empty());
    for (i, row) in batch.vectors.iter().enumerate() {
        assert_eq!(row[0], i as f32 + 1.0, "row {} out of order", i);
    }
}

#[test]
fn test_failing_middle_batch_is_zeroed() {
    // Blocking entry point, no ambient runtime
    let driver = BatchEmbedDriver::with_policy(
        ScriptedEmbedder::new(4, Some("t50")),
        no_backoff(50),
    );
    let input = texts(120);

    let batch = driver.embed_with_retry(&input).unwrap();

    assert_eq!(driver.embedder().calls(), vec![50, 50, 50, 50, 20]);
    assert_eq!(batch.len(), 120);
    assert_eq!(batch.degraded, vec![50..100]);
    assert!(batch.vectors[50..100].iter().all(|v| v == &vec![0.0; 4]));
    assert_eq!(batch.vectors[49][0], 50.0);
    assert_eq!(batch.vectors[100][0], 101.0);
    assert!(!batch.is_degraded(49));
    assert!(batch.is_degraded(99));
}

#[tokio::test]
async fn test_empty_input_any_batch_size() {
    for size in [0usize, 1, 7, 50, 1000] {
        let driver =
            BatchEmbedDriver::with_policy(ScriptedEmbedder::new(4, None), no_backoff(size));
        let batch = driver.embed_all(&[]).await;
        assert!(batch.is_empty());
        assert!(driver.embedder().calls().is_empty());
    }
}

#[tokio::test]
async fn test_zero_batch_size_uses_default() {
    let driver = BatchEmbedDriver::with_policy(ScriptedEmbedder::new(2, None), no_backoff(0));
    driver.embed_all(&texts(51)).await;
    assert_eq!(driver.embedder().calls(), vec![50, 1]);
}

#[test]
fn test_dimensions_follow_resolution() {
    let cases = [
        ("openai", true, false, ResolvedProvider::OpenAi, 1536),
        ("google_genai", false, true, ResolvedProvider::Google, 768),
        ("anthropic", true, false, ResolvedProvider::OpenAi, 1536),
        ("", false, false, ResolvedProvider::Fallback, 768),
    ];

    for (preferred, openai, google, expected, dims) in cases {
        let creds = ProviderCredentials {
            preferred: preferred.to_string(),
            openai_api_key: openai.then(|| "sk".to_string()),
            google_api_key: google.then(|| "g".to_string()),
            project_id: None,
        };
        let resolved = resolve_embedding_provider(&creds);
        assert_eq!(resolved, expected, "preferred={:?}", preferred);
        assert_eq!(embedding_dimension(resolved), dims);
    }
}

#[tokio::test]
async fn test_client_without_credentials_uses_fallback() {
    let client = EmbeddingClient::from_config(&BridgeConfig::empty());
    assert_eq!(client.resolved_provider(), ResolvedProvider::Fallback);

    let input = texts(3);
    let vectors = client.embed(&input).await;
    assert_eq!(vectors.len(), 3);
    for (text, vector) in input.iter().zip(&vectors) {
        assert_eq!(vector, &fallback_vector(text, 768));
        let norm: f64 = vector.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}

#[tokio::test]
async fn test_driver_over_fallback_client() {
    let client = EmbeddingClient::from_config(&BridgeConfig::empty());
    let driver = BatchEmbedDriver::with_policy(client, no_backoff(5));

    let batch = driver.embed_all(&texts(12)).await;
    assert_eq!(batch.dimensions, 768);
    assert_eq!(batch.len(), 12);
    assert!(batch.degraded.is_empty());
    assert_eq!(batch.vectors[11], fallback_vector("t11", 768));
}
