//! Core data models for route scoring.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

/// A coordinate in a raster's projected reference system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("route needs at least 2 points, got {0}")]
    TooShort(usize),
    #[error("route point {index} is not a finite coordinate")]
    NonFinite { index: usize },
}

/// Ordered walking route from origin to destination.
///
/// Always holds at least two points. The first and last points are the
/// endpoints; anything in between is either an original waypoint or a
/// resampled insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    points: Vec<GeoPoint>,
}

impl Route {
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, RouteError> {
        if points.len() < 2 {
            return Err(RouteError::TooShort(points.len()));
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(RouteError::NonFinite { index });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn origin(&self) -> GeoPoint {
        self.points[0]
    }

    pub fn destination(&self) -> GeoPoint {
        self.points[self.points.len() - 1]
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }
}

/// A route paired with one raster value per point.
#[derive(Debug, Clone, Serialize)]
pub struct SampledRoute {
    /// Position of the route in its input batch.
    pub route_id: usize,
    pub points: Vec<GeoPoint>,
    /// The same points in the raster CRS, as used for cell lookup.
    pub projected: Vec<ProjectedPoint>,
    pub values: Vec<f64>,
}

impl SampledRoute {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
