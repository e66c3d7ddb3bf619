//! Batched embedding with retry and backoff
//!
//! Input is split into contiguous batches processed strictly in order. A
//! batch that still fails after the last attempt is replaced by zero
//! vectors so the output stays aligned with the input; the replaced rows
//! are listed in [`EmbeddingBatch::degraded`].

use super::{BlockingBridge, Embedder, EmbeddingClient};
use crate::error::Result;
use std::ops::Range;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(2);

/// Retry settings for the batch driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub batch_size: usize,
    pub max_attempts: u32,
    /// Sleep after failed attempt `n` is `backoff_step * n`
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    /// Batch size, with 0 meaning the default
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size > 0 {
            self.batch_size
        } else {
            DEFAULT_BATCH_SIZE
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// Embeddings aligned index-for-index with the input texts
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    /// Width of every vector, known even when there are no rows
    pub dimensions: usize,
    pub vectors: Vec<Vec<f32>>,
    /// Input rows that were replaced by zero vectors
    pub degraded: Vec<Range<usize>>,
}

impl EmbeddingBatch {
    pub fn empty(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
            degraded: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn is_degraded(&self, row: usize) -> bool {
        self.degraded.iter().any(|range| range.contains(&row))
    }

    pub fn into_vectors(self) -> Vec<Vec<f32>> {
        self.vectors
    }
}

/// Drives an [`Embedder`] over large inputs
pub struct BatchEmbedDriver<E> {
    embedder: E,
    policy: RetryPolicy,
    bridge: BlockingBridge,
}

impl<E: Embedder> BatchEmbedDriver<E> {
    pub fn new(embedder: E) -> Self {
        Self::with_policy(embedder, RetryPolicy::default())
    }

    pub fn with_policy(embedder: E, policy: RetryPolicy) -> Self {
        Self {
            embedder,
            policy,
            bridge: BlockingBridge::new(),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Embed all texts batch by batch
    pub async fn embed_all(&self, texts: &[String]) -> EmbeddingBatch {
        let dimensions = self.embedder.dimensions();
        let batch_size = self.policy.effective_batch_size();

        let mut result = EmbeddingBatch::empty(dimensions);
        result.vectors.reserve(texts.len());

        for (index, chunk) in texts.chunks(batch_size).enumerate() {
            let start = index * batch_size;

            match self.embed_chunk(start, chunk).await {
                Some(vectors) => result.vectors.extend(vectors),
                None => {
                    tracing::warn!(
                        "Embedding batch {} exhausted {} attempts; substituting {} zero vectors",
                        start,
                        self.policy.max_attempts,
                        chunk.len()
                    );
                    result
                        .vectors
                        .extend(std::iter::repeat(vec![0.0; dimensions]).take(chunk.len()));
                    result.degraded.push(start..start + chunk.len());
                }
            }
        }

        result
    }

    /// Blocking variant of [`BatchEmbedDriver::embed_all`]
    pub fn embed_with_retry(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        self.bridge.run(self.embed_all(texts))
    }

    async fn embed_chunk(&self, start: usize, chunk: &[String]) -> Option<Vec<Vec<f32>>> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.embedder.embed_batch(chunk).await {
                Ok(vectors) if vectors.len() == chunk.len() => return Some(vectors),
                Ok(vectors) => tracing::warn!(
                    "Embedding batch {} retry {}: expected {} rows, got {}",
                    start,
                    attempt,
                    chunk.len(),
                    vectors.len()
                ),
                Err(e) => tracing::warn!("Embedding batch {} retry {}: {}", start, attempt, e),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        None
    }
}

/// Embed `texts` with an [`EmbeddingClient`] configured from the environment
pub fn embed_with_retry(texts: &[String], batch_size: usize) -> Result<EmbeddingBatch> {
    let policy = RetryPolicy::default().with_batch_size(batch_size);
    BatchEmbedDriver::with_policy(EmbeddingClient::from_env(), policy).embed_with_retry(texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails the first `failures` calls, then echoes the batch length
    struct CountingEmbedder {
        dims: usize,
        failures: Mutex<u32>,
        calls: Mutex<Vec<usize>>,
    }

    impl CountingEmbedder {
        fn new(dims: usize, failures: u32) -> Self {
            Self {
                dims,
                failures: Mutex::new(failures),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().unwrap().push(texts.len());
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(BridgeError::ExternalError("503".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0; self.dims]).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.effective_batch_size(), 50);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(
            RetryPolicy::default().with_batch_size(0).effective_batch_size(),
            50
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_with_linear_backoff() {
        let driver = BatchEmbedDriver::new(CountingEmbedder::new(4, 2));
        let texts: Vec<String> = vec!["a".into(), "b".into()];

        let started = tokio::time::Instant::now();
        let batch = driver.embed_all(&texts).await;

        assert_eq!(batch.len(), 2);
        assert!(batch.degraded.is_empty());
        assert_eq!(batch.vectors[0], vec![1.0; 4]);
        assert_eq!(driver.embedder().calls.lock().unwrap().len(), 3);
        // 2s + 4s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_batch_is_zeroed() {
        let driver = BatchEmbedDriver::new(CountingEmbedder::new(3, 3));
        let texts: Vec<String> = vec!["a".into()];

        let started = tokio::time::Instant::now();
        let batch = driver.embed_all(&texts).await;

        assert_eq!(batch.vectors, vec![vec![0.0; 3]]);
        assert_eq!(batch.degraded, vec![0..1]);
        assert!(batch.is_degraded(0));
        // No sleep after the final attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let driver = BatchEmbedDriver::new(CountingEmbedder::new(768, 0));
        let batch = driver.embed_all(&[]).await;
        assert!(batch.is_empty());
        assert_eq!(batch.dimensions, 768);
        assert!(driver.embedder().calls.lock().unwrap().is_empty());
    }
}
