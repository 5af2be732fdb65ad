//! Health, readiness and statistics handlers

use axum::{extract::State, http::StatusCode, Json};
use dealflow_search::IndexStats;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub index: CheckResult,
    pub embedder: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn up(latency_ms: u64) -> Self {
        Self {
            status: "up".to_string(),
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn down(error: String) -> Self {
        Self {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(error),
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub index: IndexStats,

    /// Records held by the company directory
    pub directory_companies: usize,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: dealflow_common::VERSION.to_string(),
    })
}

/// Readiness probe - checks index integrity and the embedder
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let start = std::time::Instant::now();
    let index = match state.index.validate() {
        Ok(_) => CheckResult::up(start.elapsed().as_millis() as u64),
        Err(e) => CheckResult::down(e.to_string()),
    };

    let start = std::time::Instant::now();
    let embedder = match state.embedder.embed("readiness probe").await {
        Ok(_) => CheckResult::up(start.elapsed().as_millis() as u64),
        Err(e) => CheckResult::down(e.to_string()),
    };

    let all_healthy = index.is_up() && embedder.is_up();
    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks { index, embedder },
        }),
    )
}

/// Index and directory counters
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        index: state.index.stats(),
        directory_companies: state.companies.len(),
    })
}

/// Prometheus scrape endpoint
pub async fn metrics(State(state): State<AppState>) -> String {
    state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
