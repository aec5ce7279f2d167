use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::report::{JobState, ReportJobs};

pub struct AppState {
    pub jobs: Arc<ReportJobs>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct TriggerReportResponse {
    pub report_id: String,
}

#[derive(Serialize)]
pub struct ReportStatusResponse {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub report_id: String,
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Start a new report job
pub async fn trigger_report(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<TriggerReportResponse>) {
    let report_id = state.jobs.start();
    (
        StatusCode::ACCEPTED,
        Json(TriggerReportResponse {
            report_id: report_id.to_string(),
        }),
    )
}

/// Poll a report job: still running, the finished CSV, or the failure
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let report_id: Uuid = query.report_id.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("'{}' is not a valid report id", query.report_id),
            }),
        )
    })?;

    match state.jobs.poll(report_id) {
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("report {report_id} not found"),
            }),
        )),
        Some(JobState::Queued | JobState::Running) => Ok(Json(ReportStatusResponse {
            status: "Running".to_string(),
        })
        .into_response()),
        Some(JobState::Failed { reason }) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: reason }),
        )),
        Some(JobState::Complete { artifact }) => match tokio::fs::read(&artifact).await {
            Ok(bytes) => {
                let headers = [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"report_{report_id}.csv\""),
                    ),
                ];
                Ok((headers, bytes).into_response())
            }
            Err(e) => Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("failed to read report artifact: {e}"),
                }),
            )),
        },
    }
}
