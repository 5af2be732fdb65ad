//! Startup seeding from a local directory
//!
//! Layout: an optional `companies.json` array of company records, plus one
//! sub-directory per company (named by its UUID) holding PDF or text files.

use anyhow::Context;
use dealflow_common::models::CompanyRecord;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Default, PartialEq)]
pub struct SeedSummary {
    pub companies: usize,
    pub documents: usize,
    pub failed: usize,
}

pub async fn seed_from_dir(state: &AppState, dir: &Path) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    let manifest = dir.join("companies.json");
    if manifest.is_file() {
        let raw = tokio::fs::read_to_string(&manifest)
            .await
            .with_context(|| format!("reading {}", manifest.display()))?;
        let records: Vec<CompanyRecord> =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", manifest.display()))?;

        for record in records {
            state.processor.index_company_profile(&record).await?;
            state.companies.upsert(record);
            summary.companies += 1;
        }
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("reading {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(company_id) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| Uuid::parse_str(n).ok())
        else {
            warn!(path = %path.display(), "Skipping directory not named by a company id");
            continue;
        };

        let industry = state
            .companies
            .get(&company_id)
            .and_then(|c| c.industry)
            .map(|i| i.as_str().to_string());
        let report = state
            .processor
            .ingest_directory(&path, company_id, industry, state.shutdown.clone())
            .await?;
        summary.documents += report.succeeded.len();
        summary.failed += report.failed.len();
    }

    info!(
        companies = summary.companies,
        documents = summary.documents,
        failed = summary.failed,
        "Seed data loaded"
    );
    Ok(summary)
}
