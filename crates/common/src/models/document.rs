//! Source documents (filings, decks, research notes)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of source material a document was extracted from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Filing,
    Deck,
    Report,
    ResearchNote,
    #[default]
    Other,
}

impl DocumentType {
    /// Guess the document type from a file name
    pub fn from_filename(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if ["10-k", "10k", "10-q", "10q", "s-1", "filing", "annual"]
            .iter()
            .any(|m| lower.contains(m))
        {
            DocumentType::Filing
        } else if ["deck", "pitch", "presentation"].iter().any(|m| lower.contains(m)) {
            DocumentType::Deck
        } else if ["note", "memo"].iter().any(|m| lower.contains(m)) {
            DocumentType::ResearchNote
        } else if lower.contains("report") {
            DocumentType::Report
        } else {
            DocumentType::Other
        }
    }
}

/// An ingested document.
///
/// Immutable once ingested. A revised document is ingested under a new id and
/// the old one deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,

    /// Company the document describes
    pub company_id: Uuid,

    /// Title or original file name
    pub title: String,

    #[serde(default)]
    pub document_type: DocumentType,

    /// Extracted plain text
    pub text: String,

    /// Industry tag copied into index metadata for filtered search
    #[serde(default)]
    pub industry: Option<String>,

    pub ingested_at: DateTime<Utc>,
}

impl Document {
    /// Create a document stamped with the current time
    pub fn new(
        company_id: Uuid,
        title: impl Into<String>,
        document_type: DocumentType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            title: title.into(),
            document_type,
            text: text.into(),
            industry: None,
            ingested_at: Utc::now(),
        }
    }

    /// Attach an industry tag
    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }
}
