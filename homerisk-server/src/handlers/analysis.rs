//! Submission intake and report read handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use homerisk_core::orchestrator::{Contact, SubmitRequest};
use homerisk_model::{GeoPoint, JobId, RequestSource, RiskReport};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::AppState;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    // Optional at the deserialization layer so absence surfaces as our 400
    // validation error instead of a body-rejection status.
    #[serde(default)]
    pub address: Option<String>,
    pub geo: Option<GeoPoint>,
    pub neighborhood: Option<String>,
    pub contact: Option<ContactBody>,
    pub source: Option<RequestSource>,
}

#[derive(Debug, Deserialize)]
pub struct ContactBody {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// `POST /submit-analysis`: accept-and-return-id. 202 for a new or refreshed
/// job, 200 with `cached: true` for a TTL hit.
pub async fn submit_analysis(
    State(state): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> AppResult<Response> {
    let request = SubmitRequest {
        address: body.address.unwrap_or_default(),
        geo: body.geo,
        neighborhood: body.neighborhood,
        contact: body.contact.map(|contact| Contact {
            email: contact.email,
            name: contact.name,
            phone: contact.phone,
        }),
        source: body.source,
    };

    let outcome = state.orchestrator.submit(request).await?;
    info!(job_id = %outcome.job_id, cached = outcome.cached, "submission accepted");

    let response = if outcome.cached {
        (
            StatusCode::OK,
            Json(json!({
                "job_id": outcome.job_id,
                "status": outcome.status,
                "cached": true,
            })),
        )
    } else {
        (
            StatusCode::ACCEPTED,
            Json(json!({
                "job_id": outcome.job_id,
                "status": outcome.status,
            })),
        )
    };
    Ok(response.into_response())
}

/// `GET /report/{job_id}`: the full report JSON, verbatim from the store.
pub async fn read_report(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<RiskReport>> {
    // A malformed id can never name a report; same outcome as unknown.
    let job_id =
        JobId::parse(job_id).map_err(|_| AppError::not_found("Report not found"))?;
    match state.store.get(&job_id).await.map_err(|err| {
        AppError::internal(format!("report lookup failed: {err}"))
    })? {
        Some(report) => Ok(Json(report)),
        None => Err(AppError::not_found("Report not found")),
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
