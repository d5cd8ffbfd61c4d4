//! Equidistant route densification.
//!
//! Each segment gets `max(floor(d / spacing), 1)` interior points, where
//! `d` is the WGS84 geodesic length of the segment. Interior points are
//! placed by linear interpolation in the UTM zone of the route's first
//! point and projected back to latitude/longitude. Original vertices are
//! copied through untouched.
//!
//! The zone is never switched mid-route, so routes that cross a zone
//! boundary are interpolated with some extra scale distortion. At walking
//! distances this is far below the raster cell size.

use geo::{Distance, Geodesic, Point};
use thiserror::Error;

use crate::models::{GeoPoint, ProjectedPoint};
use crate::projection::{Crs, ProjectionError, UtmZone};

/// Spacing used by the route scoring service.
pub const DEFAULT_SPACING_M: f64 = 4.0;

/// Smallest accepted spacing in metres.
pub const MIN_SPACING_M: f64 = 1e-3;

#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("spacing must be a positive distance in metres, got {0}")]
    InvalidSpacing(f64),
    #[error("spacing {0} m is below the 0.001 m minimum")]
    SpacingTooSmall(f64),
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),
}

/// Geodesic distance in metres between two points on the WGS84 ellipsoid.
pub fn geodesic_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    Geodesic.distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat))
}

/// Number of points inserted into a segment of `distance_m` metres.
pub fn interior_count(distance_m: f64, spacing_m: f64) -> usize {
    ((distance_m / spacing_m).floor() as usize).max(1)
}

/// Densify `path` so consecutive points are roughly `spacing_m` apart.
///
/// Paths with fewer than two points are returned unchanged.
pub fn resample(path: &[GeoPoint], spacing_m: f64) -> Result<Vec<GeoPoint>, ResampleError> {
    if !spacing_m.is_finite() || spacing_m <= 0.0 {
        return Err(ResampleError::InvalidSpacing(spacing_m));
    }
    if spacing_m < MIN_SPACING_M {
        return Err(ResampleError::SpacingTooSmall(spacing_m));
    }
    let Some(&first) = path.first() else {
        return Ok(Vec::new());
    };
    if path.len() < 2 {
        return Ok(path.to_vec());
    }

    let projector = Crs::Utm(UtmZone::for_point(first)).projector()?;
    let mut out = Vec::with_capacity(path.len());
    out.push(first);

    for pair in path.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let count = interior_count(geodesic_distance(start, end), spacing_m);

        let p1 = projector.forward(start)?;
        let p2 = projector.forward(end)?;
        let steps = (count + 1) as f64;
        for j in 1..=count {
            let t = j as f64 / steps;
            let x = p1.x + (p2.x - p1.x) * t;
            let y = p1.y + (p2.y - p1.y) * t;
            out.push(projector.inverse(ProjectedPoint::new(x, y))?);
        }
        out.push(end);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn austin_path() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(30.28565, -97.73921),
            GeoPoint::new(30.28401, -97.73905),
            GeoPoint::new(30.28390, -97.74102),
            GeoPoint::new(30.27468, -97.74035),
        ]
    }

    fn expected_len(path: &[GeoPoint], spacing: f64) -> usize {
        path.windows(2)
            .map(|w| interior_count(geodesic_distance(w[0], w[1]), spacing) + 1)
            .sum::<usize>()
            + 1
    }

    #[test]
    fn geodesic_distance_matches_reference() {
        // One degree of latitude at the equator on WGS84.
        let d = geodesic_distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 110_574.389).abs() < 0.01, "d = {d}");
    }

    #[test]
    fn preserves_original_vertices_in_order() {
        let path = austin_path();
        let dense = resample(&path, 4.0).unwrap();
        assert_eq!(dense.first(), path.first());
        assert_eq!(dense.last(), path.last());

        let mut cursor = 0;
        for vertex in &path {
            let found = dense[cursor..]
                .iter()
                .position(|p| p == vertex)
                .expect("original vertex missing");
            cursor += found + 1;
        }
    }

    #[test]
    fn output_length_follows_segment_counts() {
        let path = austin_path();
        for spacing in [1.0, 4.0, 25.0, 10_000.0] {
            let dense = resample(&path, spacing).unwrap();
            assert_eq!(dense.len(), expected_len(&path, spacing), "spacing {spacing}");
        }
    }

    #[test]
    fn short_segment_still_gets_one_insertion() {
        let path = vec![GeoPoint::new(30.0, -97.0), GeoPoint::new(30.00001, -97.0)];
        let dense = resample(&path, 4.0).unwrap();
        assert_eq!(dense.len(), 3);
        let mid = dense[1];
        assert!(mid.lat > 30.0 && mid.lat < 30.00001);
    }

    #[test]
    fn inserted_points_are_near_spacing() {
        let path = vec![GeoPoint::new(30.28565, -97.73921), GeoPoint::new(30.27468, -97.74035)];
        let dense = resample(&path, 4.0).unwrap();
        for pair in dense.windows(2) {
            let d = geodesic_distance(pair[0], pair[1]);
            assert!(d > 3.5 && d < 4.5, "gap {d}");
        }
    }

    #[test]
    fn duplicate_vertices_are_kept() {
        let p = GeoPoint::new(30.2849, -97.7341);
        let path = vec![p, p, GeoPoint::new(30.2850, -97.7341)];
        let dense = resample(&path, 4.0).unwrap();
        assert_eq!(dense.len(), expected_len(&path, 4.0));
        assert_eq!(dense[0], p);
        assert_eq!(dense[2], p);
    }

    #[test]
    fn single_point_is_returned_as_is() {
        let path = vec![GeoPoint::new(30.0, -97.0)];
        assert_eq!(resample(&path, 4.0).unwrap(), path);
        assert!(resample(&[], 4.0).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_spacing() {
        let path = austin_path();
        assert_eq!(resample(&path, 0.0), Err(ResampleError::InvalidSpacing(0.0)));
        assert!(resample(&path, -1.0).is_err());
        assert!(resample(&path, f64::NAN).is_err());
    }

    #[test]
    fn rejects_spacing_below_minimum() {
        let path = austin_path();
        assert_eq!(
            resample(&path, 1e-300),
            Err(ResampleError::SpacingTooSmall(1e-300))
        );
        assert_eq!(
            resample(&path, MIN_SPACING_M / 2.0),
            Err(ResampleError::SpacingTooSmall(MIN_SPACING_M / 2.0))
        );
        let short = vec![GeoPoint::new(30.0, -97.0), GeoPoint::new(30.00001, -97.0)];
        assert!(resample(&short, MIN_SPACING_M).is_ok());
    }

    #[test]
    fn resampling_again_grows_by_at_most_segment_count() {
        let path = austin_path();
        let once = resample(&path, 4.0).unwrap();
        let twice = resample(&once, 4.0).unwrap();
        let segments = once.len() - 1;
        // Every densified segment is shorter than two spacings, so it
        // receives exactly the one forced insertion.
        assert_eq!(twice.len() - once.len(), segments);
    }
}
