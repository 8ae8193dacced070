//! Dashboard HTTP API
//!
//! Read-only endpoints polled by the local UI. Every request re-reads the
//! CSV store, so the UI always sees the latest completed append.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use super::DashboardState;
use crate::analytics::{analyze_store, AnalyticsView};
use crate::persistence::{load_series, TIMESTAMP_FORMAT};
use crate::types::CanonicalRecord;

const DEFAULT_RECORDS_LIMIT: usize = 8;
const MAX_RECORDS_LIMIT: usize = 1_000;

/// Create the API router with all endpoints
pub fn create_router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/api/ratio", get(get_ratio))
        .route("/api/records", get(get_records))
        .route("/api/health", get(get_health))
        .with_state(state)
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn read_records(state: &DashboardState) -> anyhow::Result<Vec<CanonicalRecord>> {
    let path = state.store_path.clone();
    tokio::task::spawn_blocking(move || load_series(&path)).await?
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/ratio - Latest totals, ratio series, trend and projections
async fn get_ratio(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    let path = state.store_path.clone();
    let config = state.analytics.clone();
    let result = tokio::task::spawn_blocking(move || analyze_store(&path, &config)).await;

    match result {
        Ok(Ok(view)) => Json(ApiResponse::success(view)),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Analytics failed");
            Json(ApiResponse::<AnalyticsView>::error(e.to_string()))
        }
        Err(e) => Json(ApiResponse::<AnalyticsView>::error(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct RecordsQuery {
    limit: Option<usize>,
}

/// GET /api/records?limit=8 - Most recent raw rows, oldest first
async fn get_records(
    Query(query): Query<RecordsQuery>,
    State(state): State<Arc<DashboardState>>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_RECORDS_LIMIT);
    if limit > MAX_RECORDS_LIMIT {
        return Json(ApiResponse::<Vec<RecordResponse>>::error(format!(
            "limit must be at most {}",
            MAX_RECORDS_LIMIT
        )));
    }

    match read_records(&state).await {
        Ok(records) => {
            let start = records.len().saturating_sub(limit);
            let rows: Vec<RecordResponse> = records[start..].iter().map(RecordResponse::from).collect();
            Json(ApiResponse::success(rows))
        }
        Err(e) => Json(ApiResponse::<Vec<RecordResponse>>::error(e.to_string())),
    }
}

/// GET /api/health - Store status
async fn get_health(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    match read_records(&state).await {
        Ok(records) => Json(ApiResponse::success(HealthResponse {
            store_path: state.store_path.display().to_string(),
            store_exists: state.store_path.exists(),
            rows: records.len(),
            last_record_at: records
                .last()
                .map(|r| r.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            refresh_secs: state.analytics.refresh_secs,
        })),
        Err(e) => Json(ApiResponse::<HealthResponse>::error(e.to_string())),
    }
}
