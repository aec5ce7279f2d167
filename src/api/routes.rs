use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::report::ReportJobs;

use super::handlers::{get_report, health_check, trigger_report, AppState};

pub fn create_api_router(jobs: Arc<ReportJobs>) -> Router {
    let state = Arc::new(AppState { jobs });

    Router::new()
        .route("/health", get(health_check))
        .route("/trigger_report", post(trigger_report))
        .route("/get_report", get(get_report))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
