//! Ingestion error types

use dealflow_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParse { path: String, message: String },

    #[error("Failed to read {format} document {path}: {message}")]
    Malformed {
        format: &'static str,
        path: String,
        message: String,
    },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Document {0} has no text")]
    EmptyDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] AppError),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Core(inner) => inner,
            IngestionError::PdfParse { .. }
            | IngestionError::Malformed { .. }
            | IngestionError::UnsupportedFormat(_)
            | IngestionError::EmptyDocument(_) => AppError::InvalidFormat {
                message: e.to_string(),
            },
            IngestionError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                AppError::NotFound {
                    resource_type: "file".to_string(),
                    id: io.to_string(),
                }
            }
            IngestionError::Io(_) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}
