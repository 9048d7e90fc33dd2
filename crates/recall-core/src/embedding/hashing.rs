//! Local feature-hashing embedder.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::search::tokenize;
use crate::{Error, Result};

/// Provider name reported by [`HashingEmbedder`].
pub const HASHING_PROVIDER_NAME: &str = "hashing";

/// Deterministic bag-of-words embedder that needs no external service.
///
/// Every token is hashed into one of `dimensions` buckets with a hash-derived
/// sign, and the result is L2-normalized. Texts sharing vocabulary get a
/// positive cosine similarity; texts without shared tokens score near zero.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    model: String,
}

impl HashingEmbedder {
    /// Creates an embedder producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::invalid_config("embedding dimensions must be positive"));
        }
        Ok(Self {
            dimensions,
            model: format!("hashing-{dimensions}"),
        })
    }

    /// Returns the output dimension.
    #[inline]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            let hash = u64::from_le_bytes(bytes);

            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        HASHING_PROVIDER_NAME
    }
}
