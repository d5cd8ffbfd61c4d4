//! Request pipeline: geocode, fetch alternatives, score against the raster.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use utci_core::{
    score_encoded_paths, ExportSink, GeoPoint, LoadOptions, NoopSink, RasterField, ScoredBatch,
    ScoringOptions, SkippedRoute, ValueRange,
};
use utci_providers::{DirectionsRoute, ProviderError};

use crate::error::ProcessError;
use crate::export::FileExportSink;
use crate::raster_source::RasterSource;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessRouteRequest {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<GeoPoint> for LatLng {
    fn from(point: GeoPoint) -> Self {
        Self {
            lat: point.lat,
            lng: point.lon,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    pub route_id: usize,
    /// Resampled route as `[lat, lon]` pairs.
    pub coordinates: Vec<[f64; 2]>,
    pub mean_utci: Option<f64>,
    pub min_utci: Option<f64>,
    pub max_utci: Option<f64>,
    pub normalized_utci: Option<f64>,
    pub utci_values: Vec<f64>,
    pub shade_percentage: f64,
    pub rank: usize,
    pub duration: String,
    pub distance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessRouteResponse {
    pub routes: Vec<RouteResult>,
    pub origin: LatLng,
    pub destination: LatLng,
    /// Range of the route means.
    pub utci_range: Option<ValueRange>,
    pub shade_threshold: Option<f64>,
    pub skipped_routes: Vec<SkippedRoute>,
}

fn required(field: &Option<String>) -> Result<&str, ProcessError> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ProcessError::Input)
}

/// Every geocoding failure is reported as unresolved coordinates (400).
fn geocoding_error(address: &str, err: ProviderError) -> ProcessError {
    if !matches!(err, ProviderError::NotFound(_)) {
        tracing::warn!(address, error = %err, "Geocoding request failed");
    }
    ProcessError::Geocoding {
        address: address.to_string(),
    }
}

pub async fn process_route(
    state: &AppState,
    request: ProcessRouteRequest,
) -> Result<ProcessRouteResponse, ProcessError> {
    let origin_text = required(&request.origin)?;
    let destination_text = required(&request.destination)?;
    tracing::info!(origin = origin_text, destination = destination_text, "Processing route");

    let geocoder = state.geocoder();
    let (origin, destination) = tokio::try_join!(
        async {
            geocoder
                .geocode(origin_text)
                .await
                .map_err(|e| geocoding_error(origin_text, e))
        },
        async {
            geocoder
                .geocode(destination_text)
                .await
                .map_err(|e| geocoding_error(destination_text, e))
        },
    )?;
    tracing::debug!(?origin, ?destination, "Resolved coordinates");

    let alternatives = state
        .directions()
        .directions(origin, destination)
        .await
        .map_err(|e| ProcessError::Internal(format!("directions request failed: {e}")))?;
    if alternatives.is_empty() {
        return Err(ProcessError::NoRoute);
    }
    tracing::info!(count = alternatives.len(), "Fetched alternative routes");

    let field = load_raster(state).await?;
    let scored = score(state, field, &alternatives).await?;

    for skipped in &scored.skipped {
        tracing::warn!(route_id = skipped.route_id, reason = %skipped.reason, "Skipped route");
    }
    for failure in &scored.export_failures {
        tracing::warn!(route_id = ?failure.route_id, error = %failure.error, "Route export failed");
    }
    if scored.stats.routes.is_empty() {
        let reason = scored
            .skipped
            .first()
            .map(|s| s.reason.clone())
            .unwrap_or_else(|| "no route could be scored".to_string());
        return Err(ProcessError::Internal(reason));
    }

    Ok(build_response(&scored, &alternatives, origin, destination))
}

/// Cached raster for the configured source, loading it on first use.
pub async fn load_raster(state: &AppState) -> Result<Arc<dyn RasterField>, ProcessError> {
    let config = state.config();
    let source = RasterSource::from_config(config);
    let key = source.cache_key();
    if let Some(field) = state.rasters().get(&key) {
        return Ok(field);
    }

    let unavailable = |reason: String| ProcessError::DataUnavailable {
        location: key.clone(),
        reason,
    };
    let path = source
        .resolve(state.http())
        .await
        .map_err(|e| unavailable(e.to_string()))?;

    let format = config.raster_format;
    let options = LoadOptions {
        fallback_epsg: Some(config.raster_epsg),
    };
    let started = Instant::now();
    let field = tokio::task::spawn_blocking(move || utci_core::load(&path, format, &options))
        .await
        .map_err(|e| ProcessError::Internal(format!("raster load task failed: {e}")))?
        .map_err(|e| unavailable(e.to_string()))?;

    let geometry = field.geometry();
    tracing::info!(
        source = %key,
        %format,
        rows = geometry.rows,
        cols = geometry.cols,
        epsg = field.crs().epsg(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Loaded UTCI raster"
    );
    state.rasters().insert(key.clone(), field.clone());
    Ok(field)
}

async fn score(
    state: &AppState,
    field: Arc<dyn RasterField>,
    alternatives: &[DirectionsRoute],
) -> Result<ScoredBatch, ProcessError> {
    let config = state.config();
    let paths: Vec<String> = alternatives.iter().map(|r| r.encoded_path.clone()).collect();
    let options = ScoringOptions {
        spacing_m: config.spacing_m,
        shade_percentile: config.shade_percentile,
    };
    let sink: Box<dyn ExportSink + Send> = if config.export_enabled {
        Box::new(FileExportSink::new(&config.output_dir, field.crs().epsg()))
    } else {
        Box::new(NoopSink)
    };

    tokio::task::spawn_blocking(move || {
        score_encoded_paths(&paths, field.as_ref(), sink.as_ref(), &options)
    })
    .await
    .map_err(|e| ProcessError::Internal(format!("scoring task failed: {e}")))
}

fn build_response(
    scored: &ScoredBatch,
    alternatives: &[DirectionsRoute],
    origin: GeoPoint,
    destination: GeoPoint,
) -> ProcessRouteResponse {
    let routes = scored
        .stats
        .routes
        .iter()
        .filter_map(|stats| {
            let sampled = scored.sampled_route(stats.route_id)?;
            let provider = alternatives.get(stats.route_id)?;
            Some(RouteResult {
                route_id: stats.route_id,
                coordinates: sampled.points.iter().map(|p| [p.lat, p.lon]).collect(),
                mean_utci: stats.mean,
                min_utci: stats.min,
                max_utci: stats.max,
                normalized_utci: stats.normalized_score,
                utci_values: sampled.values.clone(),
                shade_percentage: stats.shade_percentage,
                rank: stats.rank,
                duration: provider.duration_text.clone(),
                distance: provider.distance_text.clone(),
            })
        })
        .collect();

    ProcessRouteResponse {
        routes,
        origin: origin.into(),
        destination: destination.into(),
        utci_range: scored.stats.mean_range,
        shade_threshold: scored.stats.shade_threshold,
        skipped_routes: scored.skipped.clone(),
    }
}
