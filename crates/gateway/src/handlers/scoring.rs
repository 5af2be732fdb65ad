//! Fit scoring and ranking handlers

use axum::{extract::State, Json};
use dealflow_common::{
    errors::{AppError, Result},
    models::CompanyRecord,
};
use dealflow_search::{RankOptions, ScoreResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use super::validate_request;
use crate::AppState;

/// Same ceiling as `SearchRequest.k`
const MAX_EVIDENCE_K: usize = 100;

fn check_options(options: &RankOptions) -> Result<()> {
    match options.evidence_k {
        Some(k) if k == 0 || k > MAX_EVIDENCE_K => Err(AppError::invalid_argument(format!(
            "options.evidence_k must be between 1 and {MAX_EVIDENCE_K}"
        ))),
        _ => Ok(()),
    }
}

/// Score one company
#[derive(Debug, Deserialize, Validate)]
pub struct ScoreRequest {
    /// Company looked up in the directory
    #[serde(default)]
    pub company_id: Option<Uuid>,

    /// Inline record; takes precedence over `company_id`
    #[serde(default)]
    pub company: Option<CompanyRecord>,

    /// Without a query, relevance rests on no evidence
    #[serde(default)]
    #[validate(length(max = 8000))]
    pub query: Option<String>,

    #[serde(default)]
    pub options: RankOptions,
}

/// Rank candidate companies against a query
#[derive(Debug, Deserialize, Validate)]
pub struct RankRequest {
    #[validate(length(min = 1, max = 8000))]
    pub query: String,

    /// Candidates from the directory; every known company when empty
    #[serde(default)]
    pub company_ids: Vec<Uuid>,

    /// Inline candidates, ranked alongside directory ones
    #[serde(default)]
    pub companies: Vec<CompanyRecord>,

    #[serde(default)]
    pub options: RankOptions,

    /// Truncate the ranked list
    #[serde(default)]
    #[validate(range(min = 1))]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct RankResponse {
    pub query: String,
    pub total_candidates: usize,
    pub results: Vec<ScoreResult>,
    pub processing_time_ms: u64,
}

pub async fn score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResult>> {
    validate_request(&request)?;
    check_options(&request.options)?;

    let company = match (request.company, request.company_id) {
        (Some(company), _) => company,
        (None, Some(id)) => state
            .companies
            .get(&id)
            .ok_or_else(|| AppError::CompanyNotFound { id: id.to_string() })?,
        (None, None) => {
            return Err(AppError::invalid_argument(
                "either company or company_id is required",
            ))
        }
    };

    let result = state
        .ranker
        .score_company(request.query.as_deref(), &company, &request.options)
        .await?;

    tracing::info!(
        company_id = %company.id,
        score = result.score,
        recommendation = result.recommendation.as_str(),
        "Company scored"
    );
    Ok(Json(result))
}

pub async fn rank(
    State(state): State<AppState>,
    Json(request): Json<RankRequest>,
) -> Result<Json<RankResponse>> {
    let start = Instant::now();
    validate_request(&request)?;
    check_options(&request.options)?;

    let mut candidates = if request.company_ids.is_empty() && request.companies.is_empty() {
        state.companies.all()
    } else {
        let known = state.companies.get_many(&request.company_ids);
        if known.len() != request.company_ids.len() {
            let missing = request
                .company_ids
                .iter()
                .find(|id| !known.iter().any(|c| &c.id == *id))
                .map(|id| id.to_string())
                .unwrap_or_default();
            return Err(AppError::CompanyNotFound { id: missing });
        }
        known
    };
    candidates.extend(request.companies);

    let mut results = state
        .ranker
        .rank(&request.query, &candidates, &request.options)
        .await?;
    if let Some(limit) = request.limit {
        results.truncate(limit);
    }

    Ok(Json(RankResponse {
        query: request.query,
        total_candidates: candidates.len(),
        results,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
