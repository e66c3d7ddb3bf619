//! Hash-based pseudo-embeddings
//!
//! Deterministic stand-in vectors used when no embedding provider is
//! reachable. They keep storage and similarity search working but carry no
//! semantic meaning, so they are NOT suitable for production retrieval.

use super::EmbeddingProvider;
use crate::error::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha512};

/// Added to the norm before dividing
const NORM_EPSILON: f64 = 1e-10;

/// Derive a unit-length vector of `dim` components from `text`.
///
/// SHA-512 of the text seeds a chain of digests (each one hashing the
/// previous digest) until `dim * 4` bytes exist; those bytes are read as
/// little-endian `f32`s and L2-normalized. Bit patterns that decode to NaN
/// or infinity become 0.0 so the norm stays finite.
pub fn fallback_vector(text: &str, dim: usize) -> Vec<f32> {
    if dim == 0 {
        return Vec::new();
    }
    let needed = dim * 4;

    let mut digest = Sha512::digest(text.as_bytes());
    let mut raw = Vec::with_capacity(needed + digest.len());
    raw.extend_from_slice(&digest);
    while raw.len() < needed {
        digest = Sha512::digest(digest.as_slice());
        raw.extend_from_slice(&digest);
    }

    let values: Vec<f64> = raw[..needed]
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .map(|v| if v.is_finite() { v as f64 } else { 0.0 })
        .collect();

    normalize(values, raw[0])
}

/// Scale to unit length.
///
/// Components are first divided by the largest magnitude so tiny (even
/// subnormal) inputs still normalize to 1. A vector with no non-zero
/// component becomes the basis vector picked by `seed`.
fn normalize(values: Vec<f64>, seed: u8) -> Vec<f32> {
    let max_abs = values.iter().fold(0.0f64, |max, v| max.max(v.abs()));

    if max_abs == 0.0 {
        let mut unit = vec![0.0f32; values.len()];
        if !unit.is_empty() {
            let index = seed as usize % unit.len();
            unit[index] = 1.0;
        }
        return unit;
    }

    let scaled: Vec<f64> = values.into_iter().map(|v| v / max_abs).collect();
    let norm = scaled.iter().map(|v| v * v).sum::<f64>().sqrt();
    let denom = norm + NORM_EPSILON;

    scaled.into_iter().map(|v| (v / denom) as f32).collect()
}

/// Local embedder backed by [`fallback_vector`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEmbedder;

impl FallbackEmbedder {
    pub fn new() -> Self {
        Self
    }

    pub fn embed_texts(&self, texts: &[String], dimensions: usize) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| fallback_vector(text, dimensions))
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbedder {
    async fn embed_batch(&self, texts: &[String], dimensions: usize) -> Result<Vec<Vec<f32>>> {
        Ok(self.embed_texts(texts, dimensions))
    }

    fn provider_name(&self) -> &str {
        "fallback"
    }

    fn model_name(&self) -> &str {
        "sha512-hash"
    }
}
