//! Shared gateway state

use dealflow_common::{
    config::AppConfig,
    embeddings::{create_embedder, Embedder},
    errors::Result,
    models::CompanyRecord,
};
use dealflow_ingestion::{IngestionProcessor, IngestionSettings};
use dealflow_search::{
    FeatureExtractor, FitScorer, Ranker, RetrievalOrchestrator, RetrievalSettings, ScoreWeights,
    ScoringSettings, TargetProfile, VectorIndex,
};
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<VectorIndex>,
    pub processor: Arc<IngestionProcessor>,
    pub orchestrator: Arc<RetrievalOrchestrator>,
    pub ranker: Arc<Ranker>,
    pub companies: Arc<CompanyDirectory>,
    pub prometheus: Option<PrometheusHandle>,

    /// Flips to `true` on shutdown; batch ingestion stops scheduling work
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// Wire the engine together from configuration
    pub fn build(
        config: Arc<AppConfig>,
        prometheus: Option<PrometheusHandle>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        Self::with_embedder(config, embedder, prometheus, shutdown)
    }

    pub fn with_embedder(
        config: Arc<AppConfig>,
        embedder: Arc<dyn Embedder>,
        prometheus: Option<PrometheusHandle>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let index = Arc::new(VectorIndex::from_config(&config.embedding, &config.engine)?);

        let processor = IngestionProcessor::new(
            embedder.clone(),
            index.clone(),
            IngestionSettings::from(config.as_ref()),
        )?;

        let orchestrator = Arc::new(RetrievalOrchestrator::new(
            embedder.clone(),
            index.clone(),
            RetrievalSettings::from(&config.engine),
        ));

        let scorer = FitScorer::new(ScoringSettings::from(&config.engine), TargetProfile::default())?;
        let ranker = Ranker::new(
            orchestrator.clone(),
            FeatureExtractor::from(&config.engine),
            scorer,
            ScoreWeights::from(config.engine.score_weights),
        );

        Ok(Self {
            config,
            embedder,
            index,
            processor: Arc::new(processor),
            orchestrator,
            ranker: Arc::new(ranker),
            companies: Arc::new(CompanyDirectory::default()),
            prometheus,
            shutdown,
        })
    }
}

/// Query parameters for listing companies
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyQuery {
    /// Case-insensitive substring over name, description and headquarters
    pub q: Option<String>,
    pub industry: Option<String>,
    pub region: Option<String>,
    pub min_revenue: Option<f64>,
    pub max_revenue: Option<f64>,
    pub min_employees: Option<u64>,
    pub max_employees: Option<u64>,
    pub min_growth: Option<f64>,
    pub min_margin: Option<f64>,
    pub limit: Option<usize>,
}

impl CompanyQuery {
    pub fn matches(&self, record: &CompanyRecord) -> bool {
        if let Some(q) = self.q.as_deref().map(str::to_lowercase).filter(|q| !q.is_empty()) {
            let hit = [
                Some(record.name.as_str()),
                record.description.as_deref(),
                record.headquarters.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&q));
            if !hit {
                return false;
            }
        }

        if let Some(industry) = self.industry.as_deref().filter(|s| !s.is_empty()) {
            let needle = industry.to_lowercase().replace(' ', "_");
            match record.industry {
                Some(i) if i.as_str().contains(&needle) => {}
                _ => return false,
            }
        }

        if let Some(region) = self.region.as_deref().filter(|s| !s.is_empty()) {
            let needle = region.to_lowercase().replace(' ', "_");
            match record.resolved_region() {
                Some(r) if r.as_str().contains(&needle) => {}
                _ => return false,
            }
        }

        // Range filters exclude records missing the field
        in_range(record.revenue_millions, self.min_revenue, self.max_revenue)
            && in_range(
                record.employee_count.map(|e| e as f64),
                self.min_employees.map(|e| e as f64),
                self.max_employees.map(|e| e as f64),
            )
            && in_range(record.growth_rate, self.min_growth, None)
            && in_range(record.profit_margin, self.min_margin, None)
    }
}

fn in_range(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    match value {
        Some(v) => min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m),
        None => false,
    }
}

/// In-memory company records supplied by the host
#[derive(Default)]
pub struct CompanyDirectory {
    records: RwLock<HashMap<Uuid, CompanyRecord>>,
}

impl CompanyDirectory {
    /// Insert or replace. Returns `true` when the company is new.
    pub fn upsert(&self, record: CompanyRecord) -> bool {
        self.records.write().insert(record.id, record).is_none()
    }

    pub fn get(&self, id: &Uuid) -> Option<CompanyRecord> {
        self.records.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Matching records ordered by name, then id
    pub fn list(&self, query: &CompanyQuery) -> Vec<CompanyRecord> {
        let mut matches: Vec<CompanyRecord> = self
            .records
            .read()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        matches
    }

    /// Records for `ids`, skipping unknown ones
    pub fn get_many(&self, ids: &[Uuid]) -> Vec<CompanyRecord> {
        let records = self.records.read();
        ids.iter().filter_map(|id| records.get(id).cloned()).collect()
    }

    pub fn all(&self) -> Vec<CompanyRecord> {
        self.list(&CompanyQuery::default())
    }
}
