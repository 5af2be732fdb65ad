//! DealFlow Common Library
//!
//! Shared code for all DealFlow crates including:
//! - Document, chunk and company models
//! - Embedding client abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::{create_embedder, Embedder, Embedding};
pub use errors::{AppError, Result};
pub use models::{Chunk, CompanyRecord, Document, DocumentType, Industry, Region};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
