//! Index entries and their metadata

use dealflow_common::embeddings::Embedding;
use dealflow_common::models::{Chunk, CompanyRecord, Document, DocumentType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an entry's vector represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// One chunk of an ingested document
    Chunk,
    /// A company's synthesized profile description
    CompanyProfile,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Chunk => "chunk",
            EntryKind::CompanyProfile => "company_profile",
        }
    }
}

/// Byte range `start..end` into a document's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intersection over union of two byte ranges
    pub fn jaccard(&self, other: &Span) -> f64 {
        let lo = self.start.max(other.start);
        let hi = self.end.min(other.end);
        let intersection = hi.saturating_sub(lo);
        let union = self.len() + other.len() - intersection;
        if union == 0 {
            return if self == other { 1.0 } else { 0.0 };
        }
        intersection as f64 / union as f64
    }
}

/// Metadata stored next to every vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub company_id: Uuid,
    pub document_id: Option<Uuid>,
    pub chunk_id: Option<Uuid>,
    pub kind: EntryKind,
    pub ordinal: u32,
    pub span: Option<Span>,
    pub document_type: Option<DocumentType>,
    pub industry: Option<String>,
    pub text: String,
}

/// A vector plus the metadata that identifies what it encodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: Uuid,
    pub embedding: Embedding,
    pub metadata: EntryMetadata,
}

/// Stable id of a company's profile entry, so re-indexing upserts
pub fn profile_entry_id(company_id: Uuid) -> Uuid {
    Uuid::new_v5(&company_id, b"company-profile")
}

impl IndexEntry {
    /// Entry for one chunk of a document
    pub fn for_chunk(document: &Document, chunk: &Chunk, embedding: Embedding) -> Self {
        Self {
            id: chunk.id,
            embedding,
            metadata: EntryMetadata {
                company_id: document.company_id,
                document_id: Some(document.id),
                chunk_id: Some(chunk.id),
                kind: EntryKind::Chunk,
                ordinal: chunk.ordinal,
                span: Some(Span::new(chunk.start, chunk.end)),
                document_type: Some(document.document_type),
                industry: document.industry.clone(),
                text: chunk.text.clone(),
            },
        }
    }

    /// Entry for a company's profile description
    pub fn for_company_profile(record: &CompanyRecord, text: String, embedding: Embedding) -> Self {
        Self {
            id: profile_entry_id(record.id),
            embedding,
            metadata: EntryMetadata {
                company_id: record.id,
                document_id: None,
                chunk_id: None,
                kind: EntryKind::CompanyProfile,
                ordinal: 0,
                span: None,
                document_type: None,
                industry: record.industry.map(|i| i.as_str().to_string()),
                text,
            },
        }
    }
}
