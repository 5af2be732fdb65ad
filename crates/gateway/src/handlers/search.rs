//! Semantic search handler

use axum::{extract::State, Json};
use dealflow_common::errors::Result;
use dealflow_search::{EntryFilter, Evidence};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use super::validate_request;
use crate::AppState;

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 8000))]
    pub query: String,

    /// Maximum results; the engine default when absent
    #[serde(default)]
    #[validate(range(min = 1, max = 100))]
    pub k: Option<usize>,

    #[serde(default)]
    pub filter: EntryFilter,
}

/// Search response
#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<Evidence>,
    pub processing_time_ms: u64,
}

/// Top-k evidence for a free-text query
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();
    validate_request(&request)?;

    let k = request.k.unwrap_or(state.config.engine.default_k);
    let filter = (!request.filter.is_empty()).then_some(&request.filter);
    let results = state.orchestrator.retrieve(&request.query, k, filter).await?;

    tracing::info!(
        k,
        results = results.len(),
        filtered = filter.is_some(),
        "Search completed"
    );

    Ok(Json(SearchResponse {
        query: request.query,
        total_results: results.len(),
        results,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
