//! Metadata predicates applied to candidates before the top-k cut

use super::{EntryKind, EntryMetadata};
use dealflow_common::models::DocumentType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Restricts which index entries a search may return.
///
/// Empty lists place no restriction. All populated criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryFilter {
    /// Only entries owned by one of these companies
    pub company_ids: Vec<Uuid>,

    /// Never entries owned by this company
    pub exclude_company: Option<Uuid>,

    pub document_types: Vec<DocumentType>,

    pub kinds: Vec<EntryKind>,

    /// Industry tags, compared case-insensitively
    pub industries: Vec<String>,
}

impl EntryFilter {
    /// Chunk entries of a single company
    pub fn for_company(company_id: Uuid) -> Self {
        Self {
            company_ids: vec![company_id],
            kinds: vec![EntryKind::Chunk],
            ..Default::default()
        }
    }

    pub fn excluding_company(mut self, company_id: Uuid) -> Self {
        self.exclude_company = Some(company_id);
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industries.push(industry.into());
        self
    }

    pub fn with_document_type(mut self, document_type: DocumentType) -> Self {
        self.document_types.push(document_type);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.company_ids.is_empty()
            && self.exclude_company.is_none()
            && self.document_types.is_empty()
            && self.kinds.is_empty()
            && self.industries.is_empty()
    }

    pub fn matches(&self, metadata: &EntryMetadata) -> bool {
        if !self.company_ids.is_empty() && !self.company_ids.contains(&metadata.company_id) {
            return false;
        }
        if self.exclude_company == Some(metadata.company_id) {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&metadata.kind) {
            return false;
        }
        if !self.document_types.is_empty() {
            match metadata.document_type {
                Some(dt) if self.document_types.contains(&dt) => {}
                _ => return false,
            }
        }
        if !self.industries.is_empty() {
            match metadata.industry.as_deref() {
                Some(tag) if self.industries.iter().any(|i| i.eq_ignore_ascii_case(tag)) => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(company: u128, kind: EntryKind, industry: Option<&str>) -> EntryMetadata {
        EntryMetadata {
            company_id: Uuid::from_u128(company),
            document_id: None,
            chunk_id: None,
            kind,
            ordinal: 0,
            span: None,
            document_type: Some(DocumentType::Filing),
            industry: industry.map(str::to_string),
            text: String::new(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = EntryFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&metadata(1, EntryKind::Chunk, None)));
        assert!(filter.matches(&metadata(2, EntryKind::CompanyProfile, Some("energy"))));
    }

    #[test]
    fn test_company_and_kind() {
        let filter = EntryFilter::for_company(Uuid::from_u128(1));
        assert!(filter.matches(&metadata(1, EntryKind::Chunk, None)));
        assert!(!filter.matches(&metadata(1, EntryKind::CompanyProfile, None)));
        assert!(!filter.matches(&metadata(2, EntryKind::Chunk, None)));
    }

    #[test]
    fn test_exclusion_and_industry() {
        let filter = EntryFilter::default()
            .excluding_company(Uuid::from_u128(1))
            .with_industry("Energy");
        assert!(!filter.matches(&metadata(1, EntryKind::Chunk, Some("energy"))));
        assert!(filter.matches(&metadata(2, EntryKind::Chunk, Some("energy"))));
        assert!(!filter.matches(&metadata(2, EntryKind::Chunk, Some("retail"))));
        assert!(!filter.matches(&metadata(2, EntryKind::Chunk, None)));
    }

    #[test]
    fn test_document_type() {
        let filter = EntryFilter::default().with_document_type(DocumentType::Deck);
        assert!(!filter.matches(&metadata(1, EntryKind::Chunk, None)));
    }

    #[test]
    fn test_deserialize_partial() {
        let filter: EntryFilter = serde_json::from_str(r#"{"kinds":["company_profile"]}"#).unwrap();
        assert_eq!(filter.kinds, vec![EntryKind::CompanyProfile]);
        assert!(filter.company_ids.is_empty());
    }
}
