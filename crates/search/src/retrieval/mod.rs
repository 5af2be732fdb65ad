//! Retrieval over the vector index
//!
//! Provides two entry points over the same mechanism:
//! - Evidence retrieval for a free-text query
//! - Similar-company lookup using a company's synthesized profile as the query

mod dedup;
mod orchestrator;

pub use dedup::dedup_hits;
pub use orchestrator::{RetrievalOrchestrator, RetrievalSettings};

use crate::index::{EntryKind, SearchHit, Span};
use dealflow_common::models::DocumentType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A retrieved chunk or profile offered in support of a query or score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub entry_id: Uuid,
    pub company_id: Uuid,
    pub document_id: Option<Uuid>,
    pub chunk_id: Option<Uuid>,
    pub kind: EntryKind,
    pub ordinal: u32,
    pub span: Option<Span>,
    pub document_type: Option<DocumentType>,
    pub text: String,

    /// Cosine similarity to the query
    pub similarity: f32,
}

impl From<&SearchHit> for Evidence {
    fn from(hit: &SearchHit) -> Self {
        let meta = &hit.entry.metadata;
        Self {
            entry_id: hit.entry.id,
            company_id: meta.company_id,
            document_id: meta.document_id,
            chunk_id: meta.chunk_id,
            kind: meta.kind,
            ordinal: meta.ordinal,
            span: meta.span,
            document_type: meta.document_type,
            text: meta.text.clone(),
            similarity: hit.similarity,
        }
    }
}

/// A company whose indexed content resembles a profile query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCompany {
    pub company_id: Uuid,

    /// Best similarity among the company's evidence
    pub similarity: f32,

    /// Supporting entries, best first
    pub evidence: Vec<Evidence>,
}
