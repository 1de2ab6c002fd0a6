//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;

use super::super::state::AppState;
use super::super::types::{ApiResponse, error_codes};

/// Health check response data
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub version: &'static str,
    pub git_hash: &'static str,
    /// `memory` or `postgres`
    pub backend: &'static str,
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
}

/// Health check endpoint
///
/// - Healthy: 200 OK + {code: 0, data: {...}}
/// - Database unreachable: 503 + {code: 5001, msg: "unavailable"}
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    if let Some(db) = &state.pg_db
        && let Err(e) = db.health_check().await
    {
        tracing::error!("[HEALTH] PostgreSQL ping failed: {}", e);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                code: error_codes::SERVICE_UNAVAILABLE,
                msg: "unavailable".to_string(),
                data: None,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(HealthResponse {
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("GIT_HASH"),
            backend: state.backend(),
            timestamp_ms: Utc::now().timestamp_millis(),
        })),
    )
}
