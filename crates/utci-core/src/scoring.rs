//! End-to-end scoring of encoded paths against one raster.
//!
//! A path that fails to decode, densify or sample is skipped with a
//! reason; the rest of the batch is still scored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{aggregate, BatchStats, DEFAULT_SHADE_PERCENTILE};
use crate::models::{Route, RouteError, SampledRoute};
use crate::polyline::{decode, DecodeError};
use crate::raster::RasterField;
use crate::resample::{resample, ResampleError, DEFAULT_SPACING_M};
use crate::sampler::{sample_batch, ExportFailure, ExportSink, SampleError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringOptions {
    pub spacing_m: f64,
    pub shade_percentile: f64,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            spacing_m: DEFAULT_SPACING_M,
            shade_percentile: DEFAULT_SHADE_PERCENTILE,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteFailure {
    #[error("malformed polyline: {0}")]
    Decode(#[from] DecodeError),
    #[error("resampling failed: {0}")]
    Resample(#[from] ResampleError),
    #[error("{0}")]
    Route(#[from] RouteError),
    #[error("sampling failed: {0}")]
    Sample(#[from] SampleError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRoute {
    pub route_id: usize,
    pub reason: String,
}

#[derive(Debug)]
pub struct ScoredBatch {
    /// Sampled routes in input order, skipped routes left out.
    pub sampled: Vec<SampledRoute>,
    pub stats: BatchStats,
    pub skipped: Vec<SkippedRoute>,
    pub export_failures: Vec<ExportFailure>,
}

impl ScoredBatch {
    pub fn sampled_route(&self, route_id: usize) -> Option<&SampledRoute> {
        self.sampled.iter().find(|r| r.route_id == route_id)
    }
}

/// Decode and densify one encoded path.
pub fn prepare_route(encoded: &str, spacing_m: f64) -> Result<Route, RouteFailure> {
    let points = decode(encoded)?;
    let dense = resample(&points, spacing_m)?;
    Ok(Route::new(dense)?)
}

/// Score a batch of encoded paths. Route ids are positions in `paths`.
pub fn score_encoded_paths<S: AsRef<str>>(
    paths: &[S],
    field: &dyn RasterField,
    sink: &dyn ExportSink,
    options: &ScoringOptions,
) -> ScoredBatch {
    let mut skipped = Vec::new();
    let mut routes = Vec::with_capacity(paths.len());
    for (route_id, encoded) in paths.iter().enumerate() {
        match prepare_route(encoded.as_ref(), options.spacing_m) {
            Ok(route) => routes.push((route_id, route)),
            Err(err) => skipped.push(SkippedRoute {
                route_id,
                reason: err.to_string(),
            }),
        }
    }

    let batch = sample_batch(routes.iter().map(|(id, r)| (*id, r)), field, sink);
    skipped.extend(batch.failures.into_iter().map(|(route_id, err)| SkippedRoute {
        route_id,
        reason: RouteFailure::from(err).to_string(),
    }));
    skipped.sort_by_key(|s| s.route_id);

    let stats = aggregate(&batch.sampled, options.shade_percentile);
    ScoredBatch {
        sampled: batch.sampled,
        stats,
        skipped,
        export_failures: batch.export_failures,
    }
}
