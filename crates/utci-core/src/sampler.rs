//! Route sampling against a raster field.
//!
//! Every route point is reprojected from WGS84 into the field's CRS and
//! the containing cell is read. There is no interpolation between cells.
//! Export to disk or elsewhere goes through an [`ExportSink`] so sampling
//! itself stays free of I/O.

use std::io;

use thiserror::Error;

use crate::models::{GeoPoint, Route, SampledRoute};
use crate::projection::ProjectionError;
use crate::raster::RasterField;

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("route has no points")]
    EmptyRoute,
    #[error("cannot build projector for the field CRS: {0}")]
    Projector(#[source] ProjectionError),
    #[error("cannot project route point {index}: {source}")]
    Projection {
        index: usize,
        #[source]
        source: ProjectionError,
    },
}

/// Receives sampled routes after a batch has been scored.
///
/// Failures are reported back to the caller but never affect the
/// returned statistics.
pub trait ExportSink {
    fn export_route(&self, route: &SampledRoute) -> io::Result<()>;

    fn export_batch(&self, routes: &[SampledRoute]) -> io::Result<()>;
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ExportSink for NoopSink {
    fn export_route(&self, _route: &SampledRoute) -> io::Result<()> {
        Ok(())
    }

    fn export_batch(&self, _routes: &[SampledRoute]) -> io::Result<()> {
        Ok(())
    }
}

/// Sample one route, producing one value per point in order.
pub fn sample_route(
    route_id: usize,
    route: &Route,
    field: &dyn RasterField,
) -> Result<SampledRoute, SampleError> {
    sample_points(route_id, route.points(), field)
}

/// Same as [`sample_route`] for a bare point list.
pub fn sample_points(
    route_id: usize,
    points: &[GeoPoint],
    field: &dyn RasterField,
) -> Result<SampledRoute, SampleError> {
    if points.is_empty() {
        return Err(SampleError::EmptyRoute);
    }
    let projector = field.crs().projector().map_err(SampleError::Projector)?;
    let mut projected = Vec::with_capacity(points.len());
    let mut values = Vec::with_capacity(points.len());
    for (index, point) in points.iter().enumerate() {
        let p = projector
            .forward(*point)
            .map_err(|source| SampleError::Projection { index, source })?;
        values.push(field.sample(p));
        projected.push(p);
    }
    Ok(SampledRoute {
        route_id,
        points: points.to_vec(),
        projected,
        values,
    })
}

#[derive(Debug)]
pub struct ExportFailure {
    /// `None` for the batch-level export.
    pub route_id: Option<usize>,
    pub error: io::Error,
}

/// Result of sampling a batch.
#[derive(Debug, Default)]
pub struct BatchSample {
    /// Successfully sampled routes, in input order.
    pub sampled: Vec<SampledRoute>,
    pub failures: Vec<(usize, SampleError)>,
    pub export_failures: Vec<ExportFailure>,
}

/// Sample every route of a batch and hand the results to `sink`.
///
/// A route that fails to sample is recorded in `failures` and left out
/// of the export.
pub fn sample_batch<'a, I>(routes: I, field: &dyn RasterField, sink: &dyn ExportSink) -> BatchSample
where
    I: IntoIterator<Item = (usize, &'a Route)>,
{
    let mut batch = BatchSample::default();
    for (route_id, route) in routes {
        match sample_route(route_id, route, field) {
            Ok(sampled) => batch.sampled.push(sampled),
            Err(err) => batch.failures.push((route_id, err)),
        }
    }

    for sampled in &batch.sampled {
        if let Err(error) = sink.export_route(sampled) {
            batch.export_failures.push(ExportFailure {
                route_id: Some(sampled.route_id),
                error,
            });
        }
    }
    if let Err(error) = sink.export_batch(&batch.sampled) {
        batch
            .export_failures
            .push(ExportFailure { route_id: None, error });
    }
    batch
}
