//! Embedding service abstraction
//!
//! Provides a single capability interface for every embedding provider:
//! - Hashing projection (deterministic, offline; used by tests)
//! - OpenAI-compatible HTTP endpoints (text-embedding-3-small, etc.)
//!
//! Every vector leaves an embedder wrapped in an [`Embedding`] tagged with the
//! model id that produced it, so vectors from different models are never
//! compared by accident.

mod hashing;
mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A vector together with the id of the model that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub model_id: String,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(model_id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            model_id: model_id.into(),
            vector,
        }
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }

    /// Euclidean norm
    pub fn norm(&self) -> f32 {
        self.vector.iter().map(|v| v * v).sum::<f32>().sqrt()
    }
}

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generate embeddings for multiple texts (batch). Output order matches input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Model identifier attached to every produced vector
    fn model_id(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Longest accepted input, in characters
    fn max_input_chars(&self) -> usize;
}

/// Reject inputs longer than the model accepts
pub(crate) fn check_input_length(text: &str, max_input_chars: usize) -> Result<()> {
    let len = text.chars().count();
    if len > max_input_chars {
        return Err(AppError::embedding(format!(
            "input of {} characters exceeds model limit of {}",
            len, max_input_chars
        )));
    }
    Ok(())
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" | "mock" => Ok(Arc::new(HashingEmbedder::new(
            config.model.clone(),
            config.dimension,
            config.max_input_chars,
        )?)),
        "openai" => {
            let key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
                message: "embedding.api_key is required for the openai provider".to_string(),
            })?;
            Ok(Arc::new(OpenAIEmbedder::new(key, config)?))
        }
        other => Err(AppError::Configuration {
            message: format!("unknown embedding provider '{}'", other),
        }),
    }
}
