//! Deterministic hashing embedder
//!
//! Signed feature hashing of lower-cased word tokens: every token is hashed
//! with SHA-256 into two (bucket, sign) pairs and the resulting term vector is
//! L2-normalised. Texts that share vocabulary land close together, and the same
//! input always yields bit-identical output.

use super::{check_input_length, Embedder, Embedding};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Projections per token
const HASHES_PER_TOKEN: usize = 2;

pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
    max_input_chars: usize,
}

impl HashingEmbedder {
    pub fn new(model_id: impl Into<String>, dimension: usize, max_input_chars: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(AppError::invalid_argument("embedding dimension must be positive"));
        }
        Ok(Self {
            model_id: model_id.into(),
            dimension,
            max_input_chars,
        })
    }

    /// Synchronous core shared by `embed` and `embed_batch`
    pub fn embed_sync(&self, text: &str) -> Result<Embedding> {
        check_input_length(text, self.max_input_chars)?;

        let mut vector = vec![0f32; self.dimension];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            for p in 0..HASHES_PER_TOKEN {
                let offset = p * 9;
                let mut bucket_bytes = [0u8; 8];
                bucket_bytes.copy_from_slice(&digest[offset..offset + 8]);
                let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
                let sign = if digest[offset + 8] & 1 == 0 { 1.0 } else { -1.0 };
                vector[bucket] += sign;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }

        Ok(Embedding::new(self.model_id.clone(), vector))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_sync(text)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed_sync(t)).collect()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_input_chars(&self) -> usize {
        self.max_input_chars
    }
}
