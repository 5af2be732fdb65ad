//! Company directory handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use dealflow_common::{
    errors::{AppError, Result},
    models::CompanyRecord,
};
use dealflow_search::Evidence;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::CompanyQuery;
use crate::AppState;

/// Largest `k` accepted by the similarity endpoint
const MAX_SIMILAR: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct CompanyListResponse {
    pub total: usize,
    pub companies: Vec<CompanyRecord>,
}

#[derive(Serialize)]
pub struct SimilarCompanyItem {
    pub company_id: Uuid,

    /// Present when the company is known to the directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub similarity: f32,
    pub evidence: Vec<Evidence>,
}

#[derive(Serialize)]
pub struct SimilarCompaniesResponse {
    pub company_id: Uuid,
    pub results: Vec<SimilarCompanyItem>,
}

/// Insert or replace a company record and refresh its profile entry
pub async fn upsert_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut record): Json<CompanyRecord>,
) -> Result<(StatusCode, Json<CompanyRecord>)> {
    record.id = id;
    if record.name.trim().is_empty() {
        return Err(AppError::invalid_argument("company name must not be empty"));
    }
    for (field, value) in [
        ("revenue_millions", record.revenue_millions),
        ("growth_rate", record.growth_rate),
        ("profit_margin", record.profit_margin),
    ] {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(AppError::invalid_argument(format!("{} must be finite", field)));
        }
    }

    state.processor.index_company_profile(&record).await?;
    let created = state.companies.upsert(record.clone());

    tracing::info!(company_id = %id, created, "Company upserted");
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(record)))
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompanyRecord>> {
    state
        .companies
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::CompanyNotFound { id: id.to_string() })
}

/// Filter the directory by text, industry, region and numeric ranges
pub async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> Json<CompanyListResponse> {
    let companies = state.companies.list(&query);
    Json(CompanyListResponse {
        total: companies.len(),
        companies,
    })
}

/// Companies whose indexed content resembles this company's profile
pub async fn similar_companies(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SimilarQuery>,
) -> Result<Json<SimilarCompaniesResponse>> {
    let record = state
        .companies
        .get(&id)
        .ok_or_else(|| AppError::CompanyNotFound { id: id.to_string() })?;

    let k = query.k.unwrap_or(state.config.engine.default_k);
    if k == 0 || k > MAX_SIMILAR {
        return Err(AppError::invalid_argument(format!(
            "k must lie in 1..={}",
            MAX_SIMILAR
        )));
    }

    let limit = state.embedder.max_input_chars();
    let profile: String = record.synthesize_description().chars().take(limit).collect();

    let similar = state
        .orchestrator
        .find_similar_companies(&profile, k, Some(id))
        .await?;

    let results = similar
        .into_iter()
        .map(|s| SimilarCompanyItem {
            name: state.companies.get(&s.company_id).map(|c| c.name),
            company_id: s.company_id,
            similarity: s.similarity,
            evidence: s.evidence,
        })
        .collect();

    Ok(Json(SimilarCompaniesResponse {
        company_id: id,
        results,
    }))
}
