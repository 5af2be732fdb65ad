//! Configuration management for DealFlow services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! The engine itself never loads configuration; the host application builds an
//! [`AppConfig`] and hands the relevant sections to each component.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking, retrieval and scoring parameters
    #[serde(default)]
    pub engine: EngineConfig,

    /// Ingestion concurrency
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: hashing, openai
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model identifier. Every vector in an index carries this tag.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Maximum input length accepted by the model, in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent embedding calls allowed across all ingestion work
    #[serde(default = "default_embedding_workers")]
    pub workers: usize,
}

/// Similarity metric used by the vector index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
}

/// Relative weight of retrieval relevance and financial fit
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScoreWeightsConfig {
    #[serde(default = "default_relevance_weight")]
    pub relevance: f64,
    #[serde(default = "default_financial_weight")]
    pub financial: f64,
}

impl Default for ScoreWeightsConfig {
    fn default() -> Self {
        Self {
            relevance: default_relevance_weight(),
            financial: default_financial_weight(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_max_length")]
    pub chunk_max_length: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default)]
    pub similarity_metric: SimilarityMetric,

    /// Evidence returned when a request does not specify `k`
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Span Jaccard overlap above which two hits of one document are duplicates
    #[serde(default = "default_dedup_overlap_threshold")]
    pub dedup_overlap_threshold: f64,

    /// Candidates fetched per requested result, leaving room for deduplication
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,

    #[serde(default)]
    pub score_weights: ScoreWeightsConfig,

    /// Evidence chunks considered by the relevance sub-score
    #[serde(default = "default_max_evidence")]
    pub max_evidence: usize,

    /// Linear rank decay applied to evidence similarities
    #[serde(default = "default_relevance_decay")]
    pub relevance_decay: f64,

    /// Lowest weight any ranked evidence chunk can receive
    #[serde(default = "default_relevance_decay_floor")]
    pub relevance_decay_floor: f64,

    /// Year used to turn `founded_year` into company maturity
    #[serde(default = "default_reference_year")]
    pub reference_year: i32,

    /// Number of lock shards in the vector index
    #[serde(default = "default_index_shards")]
    pub index_shards: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Documents processed concurrently by a batch ingestion
    #[serde(default = "default_max_concurrent_documents")]
    pub max_concurrent_documents: usize,

    /// Directory ingested at startup (pdf, txt, md)
    pub seed_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_body_bytes() -> usize { 8 * 1024 * 1024 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_embedding_model() -> String { "dealflow-hash-v1".to_string() }
fn default_embedding_dimension() -> usize { 384 }
fn default_max_input_chars() -> usize { 8000 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 32 }
fn default_embedding_workers() -> usize { 4 }
fn default_relevance_weight() -> f64 { 0.6 }
fn default_financial_weight() -> f64 { 0.4 }
fn default_chunk_max_length() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_k() -> usize { 5 }
fn default_dedup_overlap_threshold() -> f64 { 0.5 }
fn default_candidate_multiplier() -> usize { 3 }
fn default_max_evidence() -> usize { 5 }
fn default_relevance_decay() -> f64 { 0.15 }
fn default_relevance_decay_floor() -> f64 { 0.1 }
fn default_reference_year() -> i32 { 2025 }
fn default_index_shards() -> usize { 16 }
fn default_max_concurrent_documents() -> usize { 4 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "dealflow".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            max_input_chars: default_max_input_chars(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
            workers: default_embedding_workers(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_max_length: default_chunk_max_length(),
            chunk_overlap: default_chunk_overlap(),
            similarity_metric: SimilarityMetric::Cosine,
            default_k: default_k(),
            dedup_overlap_threshold: default_dedup_overlap_threshold(),
            candidate_multiplier: default_candidate_multiplier(),
            score_weights: ScoreWeightsConfig::default(),
            max_evidence: default_max_evidence(),
            relevance_decay: default_relevance_decay(),
            relevance_decay_floor: default_relevance_decay_floor(),
            reference_year: default_reference_year(),
            index_shards: default_index_shards(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_documents: default_max_concurrent_documents(),
            seed_dir: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__ENGINE__CHUNK_MAX_LENGTH=800
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the engine cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.chunk_max_length == 0 {
            return Err(ConfigError::Message(
                "engine.chunk_max_length must be positive".to_string(),
            ));
        }
        if engine.chunk_overlap >= engine.chunk_max_length {
            return Err(ConfigError::Message(format!(
                "engine.chunk_overlap ({}) must be smaller than engine.chunk_max_length ({})",
                engine.chunk_overlap, engine.chunk_max_length
            )));
        }
        if engine.chunk_max_length > self.embedding.max_input_chars {
            return Err(ConfigError::Message(format!(
                "engine.chunk_max_length ({}) exceeds embedding.max_input_chars ({})",
                engine.chunk_max_length, self.embedding.max_input_chars
            )));
        }
        if engine.default_k == 0 {
            return Err(ConfigError::Message(
                "engine.default_k must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&engine.dedup_overlap_threshold) {
            return Err(ConfigError::Message(
                "engine.dedup_overlap_threshold must lie in [0, 1]".to_string(),
            ));
        }
        let weights = engine.score_weights;
        if weights.relevance < 0.0 || weights.financial < 0.0 || weights.relevance + weights.financial <= 0.0 {
            return Err(ConfigError::Message(
                "engine.score_weights must be non-negative with a positive sum".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Message(
                "embedding.dimension must be positive".to_string(),
            ));
        }
        if self.embedding.max_retries > EmbeddingConfig::MAX_RETRIES {
            return Err(ConfigError::Message(format!(
                "embedding.max_retries ({}) must not exceed {}",
                self.embedding.max_retries,
                EmbeddingConfig::MAX_RETRIES
            )));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl EmbeddingConfig {
    /// Retries beyond this only lengthen an outage
    pub const MAX_RETRIES: u32 = 10;

    /// Per-request timeout for remote embedding backends
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.model, "dealflow-hash-v1");
        assert_eq!(config.engine.similarity_metric, SimilarityMetric::Cosine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_below_max_length() {
        let mut config = AppConfig::default();
        config.engine.chunk_overlap = config.engine.chunk_max_length;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chunk_length_bounded_by_embedder() {
        let mut config = AppConfig::default();
        config.engine.chunk_max_length = config.embedding.max_input_chars + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_weights_rejected() {
        let mut config = AppConfig::default();
        config.engine.score_weights = ScoreWeightsConfig {
            relevance: 0.0,
            financial: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retries_bounded() {
        let mut config = AppConfig::default();
        config.embedding.max_retries = EmbeddingConfig::MAX_RETRIES;
        assert!(config.validate().is_ok());
        config.embedding.max_retries = 64;
        assert!(config.validate().is_err());
        assert_eq!(config.embedding.timeout(), Duration::from_secs(config.embedding.timeout_secs));
    }
}
