//! Document ingestion handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use dealflow_common::{
    errors::{AppError, Result},
    models::{Document, DocumentType},
};
use dealflow_ingestion::{BatchReport, IngestionReport};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validate_request;
use crate::AppState;

/// A document pushed by the persistence layer
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct IngestDocumentRequest {
    /// Caller-assigned id. Resending identical content is a no-op; new
    /// content needs a new id or a prior delete.
    #[serde(default)]
    pub id: Option<Uuid>,

    pub company_id: Uuid,

    #[validate(length(min = 1, max = 1000))]
    pub title: String,

    /// Inferred from the title when absent
    #[serde(default)]
    pub document_type: Option<DocumentType>,

    pub text: String,

    /// Falls back to the company's industry in the directory
    #[serde(default)]
    pub industry: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchIngestRequest {
    #[validate(length(min = 1, max = 256), nested)]
    pub documents: Vec<IngestDocumentRequest>,
}

#[derive(Serialize)]
pub struct DeleteDocumentResponse {
    pub document_id: Uuid,
    pub removed_chunks: usize,
}

impl IngestDocumentRequest {
    fn into_document(self, state: &AppState) -> Result<Document> {
        let limit = state.config.server.max_body_bytes;
        if self.text.len() > limit {
            return Err(AppError::PayloadTooLarge {
                size: self.text.len(),
                limit,
            });
        }

        let document_type = self
            .document_type
            .unwrap_or_else(|| DocumentType::from_filename(&self.title));
        let industry = self.industry.or_else(|| {
            state
                .companies
                .get(&self.company_id)
                .and_then(|c| c.industry)
                .map(|i| i.as_str().to_string())
        });

        let mut document = Document::new(self.company_id, self.title, document_type, self.text);
        if let Some(id) = self.id {
            document.id = id;
        }
        document.industry = industry;
        Ok(document)
    }
}

/// Ingest one document synchronously
pub async fn ingest_document(
    State(state): State<AppState>,
    Json(request): Json<IngestDocumentRequest>,
) -> Result<(StatusCode, Json<IngestionReport>)> {
    validate_request(&request)?;
    let document = request.into_document(&state)?;

    tracing::info!(
        document_id = %document.id,
        company_id = %document.company_id,
        title = %document.title,
        "Ingesting document"
    );

    let report = state.processor.ingest(&document).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Ingest several documents; failures are reported per document
pub async fn ingest_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchIngestRequest>,
) -> Result<Json<BatchReport>> {
    validate_request(&request)?;

    let documents = request
        .documents
        .into_iter()
        .map(|d| d.into_document(&state))
        .collect::<Result<Vec<_>>>()?;

    let report = state
        .processor
        .ingest_batch(documents, state.shutdown.clone())
        .await;
    Ok(Json(report))
}

/// Remove a document and all of its chunks
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteDocumentResponse>> {
    let removed_chunks = state.processor.delete_document(&id)?;
    Ok(Json(DeleteDocumentResponse {
        document_id: id,
        removed_chunks,
    }))
}
