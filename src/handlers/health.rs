use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Serialize;

use crate::error::{ApiResponse, AppError, Result};
use crate::metrics;
use crate::AppState;

/// Per-component health report
#[derive(Debug, Serialize)]
pub struct DetailedHealth {
    pub status: String,
    pub database: String,
    pub active_backend: String,
    pub backends: BTreeMap<String, String>,
}

/// Liveness probe
/// GET /health
pub async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::<()>::success_message("ok"))
}

/// Readiness probe: checks the database and every configured backend
/// GET /health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DetailedHealth>>> {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(state.db.pool())
        .await
    {
        Ok(_) => "ok".to_string(),
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            "unavailable".to_string()
        }
    };

    let mut backends = BTreeMap::new();
    for tag in state.storage.backend_types() {
        let backend = match state.storage.for_backend(&tag) {
            Ok(backend) => backend,
            Err(_) => continue,
        };
        // Any definite answer means the backend responded; only an error
        // counts against it.
        let status = match backend.exists("health-probe").await {
            Ok(_) => "ok".to_string(),
            Err(e) => {
                tracing::warn!("Backend '{}' health check failed: {}", tag, e);
                "unavailable".to_string()
            }
        };
        backends.insert(tag, status);
    }

    let healthy = database == "ok" && backends.values().all(|s| s == "ok");
    let detail = DetailedHealth {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        database,
        active_backend: state.storage.active_type().to_string(),
        backends,
    };

    Ok(Json(ApiResponse::success(detail)))
}

/// Prometheus metrics in text exposition format
/// GET /metrics
pub async fn metrics_export() -> Result<Response> {
    let body = metrics::export()?;
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;
    Ok(response)
}
