use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::handlers::analysis;

/// Build the application router. CORS is wide open: the intake is consumed
/// by third-party frontends and the API carries no credentials.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/submit-analysis", post(analysis::submit_analysis))
        .route("/report/{job_id}", get(analysis::read_report))
        .route("/health", get(analysis::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
