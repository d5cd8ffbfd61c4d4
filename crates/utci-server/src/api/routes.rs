//! REST API routes.

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::api::request_id::{ensure_request_id, RequestId};
use crate::error::ProcessError;
use crate::pipeline::{self, ProcessRouteRequest, ProcessRouteResponse};
use crate::raster_source::RasterSource;
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/process-route", post(process_route))
        .route("/health", get(health))
        .layer(middleware::from_fn(ensure_request_id))
}

/// Score the alternative walking routes between two addresses.
async fn process_route(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<ProcessRouteRequest>, JsonRejection>,
) -> Result<Json<ProcessRouteResponse>, ProcessError> {
    // A missing or unparsable body is treated like missing fields.
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(%request_id, error = %rejection, "Unreadable route request body");
            ProcessRouteRequest::default()
        }
    };

    let response = pipeline::process_route(state.as_ref(), request).await?;
    tracing::info!(
        %request_id,
        routes = response.routes.len(),
        skipped = response.skipped_routes.len(),
        "Route request complete"
    );
    Ok(Json(response))
}

/// Liveness check.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let key = RasterSource::from_config(state.config()).cache_key();
    Json(json!({
        "status": "ok",
        "uptime_s": state.uptime_s(),
        "raster_cached": state.rasters().get(&key).is_some(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
