use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.embedding.dimension = 256;
    config.engine.chunk_max_length = 400;
    config.engine.chunk_overlap = 50;
    config.engine.index_shards = 4;
    config.rate_limit.enabled = false;
    config
}

fn app_with(config: AppConfig) -> Router {
    let (_tx, rx) = watch::channel(false);
    let state = AppState::build(Arc::new(config), None, rx).unwrap();
    create_router(state).unwrap()
}

fn app() -> Router {
    app_with(test_config())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn put_company(app: &Router, id: Uuid, name: &str) -> StatusCode {
    let body = json!({
        "name": name,
        "industry": "cybersecurity",
        "revenue_millions": 250.0,
        "employee_count": 900,
        "growth_rate": 25.0,
        "profit_margin": 15.0,
        "founded_year": 2012,
        "headquarters": "Austin, TX"
    });
    send(app, "PUT", &format!("/v1/companies/{}", id), Some(body)).await.0
}

async fn post_document(app: &Router, company_id: Uuid, title: &str, text: &str) -> Value {
    let body = json!({ "company_id": company_id, "title": title, "text": text });
    let (status, value) = send(app, "POST", "/v1/documents", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", value);
    value
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_checks_index_and_embedder() {
    let (status, body) = send(&app(), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["index"]["status"], "up");
    assert_eq!(body["checks"]["embedder"]["status"], "up");
}

#[tokio::test]
async fn test_company_round_trip_and_not_found() {
    let app = app();
    let id = Uuid::new_v4();
    assert_eq!(put_company(&app, id, "Shieldline").await, StatusCode::CREATED);
    assert_eq!(put_company(&app, id, "Shieldline Inc").await, StatusCode::OK);

    let (status, body) = send(&app, "GET", &format!("/v1/companies/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Shieldline Inc");

    let (status, body) = send(&app, "GET", &format!("/v1/companies/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "COMPANY_NOT_FOUND");
}

#[tokio::test]
async fn test_list_companies_with_filters() {
    let app = app();
    put_company(&app, Uuid::new_v4(), "Alpha Secure").await;
    put_company(&app, Uuid::new_v4(), "Beta Shield").await;

    let (status, body) = send(&app, "GET", "/v1/companies?q=alpha", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (_, body) = send(&app, "GET", "/v1/companies?min_revenue=1000", None).await;
    assert_eq!(body["total"], 0);

    let (_, body) = send(&app, "GET", "/v1/companies?industry=cyber&region=north_america", None).await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn test_ingest_then_search() {
    let app = app();
    let company = Uuid::new_v4();
    let report = post_document(
        &app,
        company,
        "annual_report.txt",
        "Managed detection and response platform protecting hospital networks.",
    )
    .await;
    assert_eq!(report["chunks"], 1);

    let (status, body) = send(
        &app,
        "POST",
        "/v1/search",
        Some(json!({ "query": "hospital network detection", "k": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_results"], 1);
    assert_eq!(body["results"][0]["company_id"], company.to_string());
}

#[tokio::test]
async fn test_search_rejects_zero_k() {
    let (status, body) = send(
        &app(),
        "POST",
        "/v1/search",
        Some(json!({ "query": "anything", "k": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_delete_document_cascades() {
    let app = app();
    let company = Uuid::new_v4();
    let report = post_document(&app, company, "deck.txt", "Pipeline of renewable assets.").await;
    let id = report["document_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "DELETE", &format!("/v1/documents/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed_chunks"], 1);

    let (status, _) = send(&app, "DELETE", &format!("/v1/documents/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "POST", "/v1/search", Some(json!({ "query": "renewable assets" }))).await;
    assert_eq!(body["total_results"], 0);
}

#[tokio::test]
async fn test_document_id_is_bound_to_its_content() {
    let app = app();
    let company = Uuid::new_v4();
    let id = Uuid::new_v4();
    let original = json!({ "id": id, "company_id": company, "title": "memo.txt", "text": "Original memo." });
    let edited = json!({ "id": id, "company_id": company, "title": "memo.txt", "text": "Edited memo." });

    let (status, _) = send(&app, "POST", "/v1/documents", Some(original.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, "POST", "/v1/documents", Some(original)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/v1/documents", Some(edited.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DOCUMENT_CONFLICT");

    let (status, _) = send(&app, "DELETE", &format!("/v1/documents/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", "/v1/documents", Some(edited)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_batch_ingest_reports_each_document() {
    let app = app();
    let company = Uuid::new_v4();
    let body = json!({
        "documents": [
            { "company_id": company, "title": "a.txt", "text": "First memo." },
            { "company_id": company, "title": "b.txt", "text": "Second memo." }
        ]
    });
    let (status, body) = send(&app, "POST", "/v1/documents/batch", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"].as_array().unwrap().len(), 2);
    assert!(body["failed"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_score_known_company() {
    let app = app();
    let id = Uuid::new_v4();
    put_company(&app, id, "Shieldline").await;
    post_document(&app, id, "filing.txt", "Endpoint security with strong recurring revenue.").await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/score",
        Some(json!({ "company_id": id, "query": "endpoint security" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let score = body["score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
    assert!(!body["evidence"].as_array().unwrap().is_empty());
    assert!(["BUY", "HOLD", "PASS"].contains(&body["recommendation"].as_str().unwrap()));
}

#[tokio::test]
async fn test_score_requires_a_company() {
    let (status, _) = send(&app(), "POST", "/v1/score", Some(json!({ "query": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rank_prefers_relevant_evidence() {
    let app = app();
    let relevant = Uuid::new_v4();
    let unrelated = Uuid::new_v4();
    put_company(&app, relevant, "Relevant").await;
    put_company(&app, unrelated, "Unrelated").await;
    post_document(&app, relevant, "r.txt", "Cloud identity and access management for banks.").await;
    post_document(&app, unrelated, "u.txt", "Organic dairy farming cooperative in the valley.").await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/rank",
        Some(json!({ "query": "identity access management banks" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_candidates"], 2);
    assert_eq!(body["results"][0]["company_id"], relevant.to_string());
}

#[tokio::test]
async fn test_rank_unknown_company_is_not_found() {
    let (status, _) = send(
        &app(),
        "POST",
        "/v1/rank",
        Some(json!({ "query": "x", "company_ids": [Uuid::new_v4()] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_evidence_k_is_bounded() {
    let app = app();
    for k in [0_u64, 101, u64::MAX] {
        let options = json!({ "evidence_k": k });
        let (status, body) = send(
            &app,
            "POST",
            "/v1/rank",
            Some(json!({ "query": "anything", "options": options })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "evidence_k={k}");
        assert_eq!(body["error"]["code"], "INVALID_ARGUMENT");

        let company = json!({ "id": Uuid::new_v4(), "name": "Inline" });
        let (status, _) = send(
            &app,
            "POST",
            "/v1/score",
            Some(json!({ "company": company, "query": "anything", "options": options })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "evidence_k={k}");
    }
}

#[tokio::test]
async fn test_score_extreme_inline_record() {
    let company = json!({
        "id": Uuid::new_v4(),
        "name": "Ancient Works",
        "founded_year": i32::MIN,
        "employee_count": u64::MAX
    });
    let (status, body) = send(
        &app(),
        "POST",
        "/v1/score",
        Some(json!({ "company": company, "query": "precision machining" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let score = body["score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
}

#[tokio::test]
async fn test_similar_companies_excludes_subject() {
    let app = app();
    let subject = Uuid::new_v4();
    let peer = Uuid::new_v4();
    put_company(&app, subject, "Subject").await;
    put_company(&app, peer, "Peer").await;

    let (status, body) = send(&app, "GET", &format!("/v1/companies/{}/similar?k=5", subject), None).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert!(results.iter().all(|r| r["company_id"] != subject.to_string()));
    assert_eq!(results[0]["company_id"], peer.to_string());
    assert_eq!(results[0]["name"], "Peer");
}

#[tokio::test]
async fn test_stats_counts_entries() {
    let app = app();
    let id = Uuid::new_v4();
    put_company(&app, id, "Counted").await;
    post_document(&app, id, "memo.txt", "Short memo.").await;

    let (status, body) = send(&app, "GET", "/v1/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"]["entries"], 2);
    assert_eq!(body["directory_companies"], 1);
}

#[tokio::test]
async fn test_rate_limit_applies_to_api_only() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let app = app_with(config);

    let (first, _) = send(&app, "GET", "/v1/stats", None).await;
    let (second, body) = send(&app, "GET", "/v1/stats", None).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    let (health, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(health, StatusCode::OK);
}
