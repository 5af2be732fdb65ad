//! Query-time retrieval: embed once, search once, deduplicate, cut

use super::{dedup_hits, Evidence, SimilarCompany};
use crate::index::{EntryFilter, VectorIndex};
use dealflow_common::config::EngineConfig;
use dealflow_common::embeddings::{Embedder, Embedding};
use dealflow_common::errors::{AppError, Result};
use dealflow_common::metrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Retrieval tuning taken from the engine configuration
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub default_k: usize,
    pub dedup_overlap_threshold: f64,

    /// Candidates fetched per requested result, so dedup has room
    pub candidate_multiplier: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RetrievalSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            default_k: config.default_k,
            dedup_overlap_threshold: config.dedup_overlap_threshold,
            candidate_multiplier: config.candidate_multiplier.max(1),
        }
    }
}

/// Turns queries into ordered, deduplicated evidence
pub struct RetrievalOrchestrator {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    settings: RetrievalSettings,
}

impl RetrievalOrchestrator {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>, settings: RetrievalSettings) -> Self {
        Self {
            embedder,
            index,
            settings,
        }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Embed a query with the index's model
    pub async fn embed_query(&self, text: &str) -> Result<Embedding> {
        let start = Instant::now();
        let result = self.embedder.embed(text).await;
        metrics::record_embedding(
            start.elapsed().as_secs_f64(),
            self.embedder.model_id(),
            1,
            result.is_ok(),
        );
        result
    }

    /// Top `k` evidence for a free-text query.
    ///
    /// Deduplication may return fewer than `k` items.
    #[instrument(skip(self, query_text, filter), fields(query_len = query_text.len()))]
    pub async fn retrieve(
        &self,
        query_text: &str,
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<Evidence>> {
        if k == 0 {
            return Err(AppError::invalid_argument("k must be positive"));
        }
        let query = self.embed_query(query_text).await?;
        self.retrieve_with_embedding(&query, k, filter)
    }

    /// Same as [`retrieve`](Self::retrieve) with a precomputed query embedding
    pub fn retrieve_with_embedding(
        &self,
        query: &Embedding,
        k: usize,
        filter: Option<&EntryFilter>,
    ) -> Result<Vec<Evidence>> {
        if k == 0 {
            return Err(AppError::invalid_argument("k must be positive"));
        }
        let start = Instant::now();

        let candidates = k.saturating_mul(self.settings.candidate_multiplier);
        let hits = self.index.search(query, candidates, filter)?;
        let fetched = hits.len();

        let evidence: Vec<Evidence> = dedup_hits(hits, self.settings.dedup_overlap_threshold)
            .iter()
            .take(k)
            .map(Evidence::from)
            .collect();

        debug!(k, fetched, returned = evidence.len(), "Retrieved evidence");
        metrics::record_retrieval(start.elapsed().as_secs_f64(), "retrieve", evidence.len());
        Ok(evidence)
    }

    /// Companies whose indexed content best matches a profile description.
    ///
    /// Evidence is grouped per company; companies are ordered by their best
    /// similarity. `exclude` removes the subject company itself.
    #[instrument(skip(self, profile_text), fields(profile_len = profile_text.len()))]
    pub async fn find_similar_companies(
        &self,
        profile_text: &str,
        k: usize,
        exclude: Option<Uuid>,
    ) -> Result<Vec<SimilarCompany>> {
        if k == 0 {
            return Err(AppError::invalid_argument("k must be positive"));
        }
        let start = Instant::now();
        let query = self.embed_query(profile_text).await?;

        let filter = match exclude {
            Some(company_id) => EntryFilter::default().excluding_company(company_id),
            None => EntryFilter::default(),
        };

        // Widen the candidate pool until k companies are found or the index is exhausted
        let total = self.index.len();
        let mut candidates = k.saturating_mul(self.settings.candidate_multiplier);
        let companies = loop {
            let hits = self.index.search(&query, candidates.max(1), Some(&filter))?;
            let exhausted = hits.len() < candidates || candidates >= total;
            let hits = dedup_hits(hits, self.settings.dedup_overlap_threshold);

            let mut grouped: Vec<SimilarCompany> = Vec::new();
            for hit in &hits {
                let evidence = Evidence::from(hit);
                match grouped.iter_mut().find(|c| c.company_id == evidence.company_id) {
                    Some(company) => company.evidence.push(evidence),
                    None => grouped.push(SimilarCompany {
                        company_id: evidence.company_id,
                        similarity: evidence.similarity,
                        evidence: vec![evidence],
                    }),
                }
            }

            if grouped.len() >= k || exhausted {
                grouped.truncate(k);
                break grouped;
            }
            candidates = candidates.saturating_mul(2);
        };

        metrics::record_retrieval(
            start.elapsed().as_secs_f64(),
            "similar_companies",
            companies.len(),
        );
        Ok(companies)
    }
}
