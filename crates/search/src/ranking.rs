//! Query → evidence per company → score → sorted list

use crate::index::EntryFilter;
use crate::retrieval::{Evidence, RetrievalOrchestrator};
use crate::scoring::{FeatureExtractor, FitScorer, ScoreResult, ScoreWeights, TargetProfile};
use dealflow_common::embeddings::Embedding;
use dealflow_common::errors::{AppError, Result};
use dealflow_common::metrics;
use dealflow_common::models::{CompanyRecord, DocumentType};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, instrument};

/// Per-request ranking overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RankOptions {
    /// Evidence retrieved per company
    pub evidence_k: Option<usize>,
    pub weights: Option<ScoreWeights>,
    pub target: Option<TargetProfile>,

    /// Restrict evidence to these document types
    pub document_types: Vec<DocumentType>,
}

/// Scores and orders candidate companies for a query
pub struct Ranker {
    orchestrator: Arc<RetrievalOrchestrator>,
    extractor: FeatureExtractor,
    scorer: FitScorer,
    default_weights: ScoreWeights,
}

impl Ranker {
    pub fn new(
        orchestrator: Arc<RetrievalOrchestrator>,
        extractor: FeatureExtractor,
        scorer: FitScorer,
        default_weights: ScoreWeights,
    ) -> Self {
        Self {
            orchestrator,
            extractor,
            scorer,
            default_weights,
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Score every company against `query` and sort by score, best first.
    ///
    /// The query is embedded once. Equal scores are ordered by company id.
    #[instrument(skip(self, query, companies, options), fields(companies = companies.len()))]
    pub async fn rank(
        &self,
        query: &str,
        companies: &[CompanyRecord],
        options: &RankOptions,
    ) -> Result<Vec<ScoreResult>> {
        let plan = self.plan(options)?;
        let embedding = self.orchestrator.embed_query(query).await?;

        let mut results = companies
            .iter()
            .map(|company| self.score_one(&plan, Some(&embedding), company))
            .collect::<Result<Vec<_>>>()?;

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.company_id.cmp(&b.company_id))
        });

        info!(
            ranked = results.len(),
            top_score = results.first().map(|r| r.score),
            "Ranking complete"
        );
        Ok(results)
    }

    /// Score a single company. Without a query, relevance rests on no evidence.
    pub async fn score_company(
        &self,
        query: Option<&str>,
        company: &CompanyRecord,
        options: &RankOptions,
    ) -> Result<ScoreResult> {
        let plan = self.plan(options)?;
        let embedding = match query.filter(|q| !q.trim().is_empty()) {
            Some(q) => Some(self.orchestrator.embed_query(q).await?),
            None => None,
        };
        self.score_one(&plan, embedding.as_ref(), company)
    }

    fn plan<'a>(&'a self, options: &RankOptions) -> Result<Plan<'a>> {
        let weights = options.weights.unwrap_or(self.default_weights);
        weights.normalized()?;

        let k = options
            .evidence_k
            .unwrap_or(self.orchestrator.settings().default_k);
        if k == 0 {
            return Err(AppError::invalid_argument("evidence_k must be positive"));
        }

        let scorer = match &options.target {
            Some(target) => Cow::Owned(self.scorer.with_target(target.clone())?),
            None => Cow::Borrowed(&self.scorer),
        };

        Ok(Plan {
            weights,
            k,
            scorer,
            document_types: options.document_types.clone(),
        })
    }

    fn score_one(
        &self,
        plan: &Plan<'_>,
        query: Option<&Embedding>,
        company: &CompanyRecord,
    ) -> Result<ScoreResult> {
        let evidence: Vec<Evidence> = match query {
            Some(embedding) => {
                let mut filter = EntryFilter::for_company(company.id);
                filter.document_types = plan.document_types.clone();
                self.orchestrator
                    .retrieve_with_embedding(embedding, plan.k, Some(&filter))?
            }
            None => Vec::new(),
        };

        let features = self.extractor.extract(company);
        let result = plan.scorer.score(company, &evidence, &features, plan.weights)?;
        metrics::record_score(result.recommendation.as_str());
        Ok(result)
    }
}

struct Plan<'a> {
    weights: ScoreWeights,
    k: usize,
    scorer: Cow<'a, FitScorer>,
    document_types: Vec<DocumentType>,
}
