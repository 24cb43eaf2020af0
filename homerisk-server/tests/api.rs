//! HTTP contract tests over the router with in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use homerisk_core::broker::MemoryBroker;
use homerisk_core::capabilities::{
    CapabilityError, Evidence, NoopNotifier, SearchProvider, Summarizer,
};
use homerisk_core::store::{JobStore, MemoryJobStore};
use homerisk_core::{Pipeline, PipelineConfig};
use homerisk_server::{AppState, routes};
use serde_json::{Value, json};
use tower::ServiceExt;

struct FakeSearch;

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Evidence>, CapabilityError> {
        Ok(vec![Evidence {
            title: "Cortes de luz reiterados".into(),
            snippet: "Vecinos reportan cortes".into(),
            link: "https://example.cl/nota".into(),
            date: None,
        }])
    }
}

struct FakeSummarizer;

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn generate(&self, _prompt: &str) -> Result<String, CapabilityError> {
        Ok(json!({
            "overall_score": 4.0,
            "summary": "Riesgo moderado.",
            "categories": {
                "utilities": {"score": 5.0, "label": "Medio", "details": "Cortes ocasionales."},
                "security": {"score": 4.0, "label": "Medio", "details": "Incidentes aislados."},
                "connectivity": {"score": 3.0, "label": "Bajo", "details": "Fibra disponible."}
            }
        })
        .to_string())
    }
}

async fn test_app() -> (Router, Pipeline) {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let pipeline = Pipeline::start(
        Arc::clone(&store),
        Arc::new(MemoryBroker::new()),
        Arc::new(FakeSearch),
        Arc::new(FakeSummarizer),
        Arc::new(NoopNotifier),
        PipelineConfig {
            cache_ttl_days: 30,
            collector_timeout: Duration::from_secs(120),
        },
    )
    .await
    .expect("pipeline start");

    let state = AppState::new(pipeline.orchestrator(), pipeline.store());
    (routes::create_router(state), pipeline)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn submission() -> Value {
    json!({
        "address": "Av. Providencia 1234, Santiago",
        "geo": {"lat": -33.43, "lng": -70.62},
        "neighborhood": "Providencia",
        "contact": {"email": "cliente@example.cl"},
        "source": "WEB_B2C",
    })
}

/// Polls the report endpoint until the job is terminal.
async fn wait_for_terminal(app: &Router, job_id: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(300), async {
        loop {
            let response = app
                .clone()
                .oneshot(get(&format!("/report/{job_id}")))
                .await
                .unwrap();
            if response.status() == StatusCode::OK {
                let report = body_json(response).await;
                let status = report["status"].as_str().unwrap();
                if status == "COMPLETED" || status == "FAILED" {
                    return report;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job never reached a terminal status")
}

#[tokio::test]
async fn submit_without_address_is_rejected() {
    let (app, pipeline) = test_app().await;

    let response = app
        .oneshot(post_json(
            "/submit-analysis",
            json!({"geo": {"lat": -33.43, "lng": -70.62}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
    pipeline.shutdown();
}

#[tokio::test]
async fn submit_accepts_and_returns_job_id() {
    let (app, pipeline) = test_app().await;

    let response = app
        .oneshot(post_json("/submit-analysis", submission()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["job_id"].as_str().unwrap().len(), 32);
    assert!(body.get("cached").is_none());
    pipeline.shutdown();
}

#[tokio::test]
async fn resubmission_within_ttl_returns_cached_report() {
    let (app, pipeline) = test_app().await;

    let first = body_json(
        app.clone()
            .oneshot(post_json("/submit-analysis", submission()))
            .await
            .unwrap(),
    )
    .await;
    let job_id = first["job_id"].as_str().unwrap().to_string();
    wait_for_terminal(&app, &job_id).await;

    let response = app
        .oneshot(post_json("/submit-analysis", submission()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["job_id"], job_id.as_str());
    assert_eq!(body["cached"], true);
    pipeline.shutdown();
}

#[tokio::test]
async fn unknown_and_malformed_report_ids_are_not_found() {
    let (app, pipeline) = test_app().await;

    for id in ["0123456789abcdef0123456789abcdef", "not-a-job-id"] {
        let response = app.clone().oneshot(get(&format!("/report/{id}"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Report not found");
    }
    pipeline.shutdown();
}

#[tokio::test]
async fn wrong_method_on_intake_is_rejected() {
    let (app, pipeline) = test_app().await;

    let response = app.oneshot(get("/submit-analysis")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    pipeline.shutdown();
}

#[tokio::test]
async fn submitted_job_is_observable_through_completion() {
    let (app, pipeline) = test_app().await;

    let accepted = body_json(
        app.clone()
            .oneshot(post_json("/submit-analysis", submission()))
            .await
            .unwrap(),
    )
    .await;
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let report = wait_for_terminal(&app, &job_id).await;
    assert_eq!(report["status"], "COMPLETED");
    assert_eq!(report["report_id"], job_id.as_str());

    let analysis = &report["risk_analysis"];
    assert!(analysis["overall_score"].is_number());
    for category in ["utilities", "security", "connectivity"] {
        assert!(analysis["categories"][category]["score"].is_number());
        assert_eq!(report["collector_results"][category]["status"], "completed");
    }
    pipeline.shutdown();
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, pipeline) = test_app().await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    pipeline.shutdown();
}
