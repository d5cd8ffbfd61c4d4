//! Coordinate reference systems keyed by EPSG code.
//!
//! Only the systems UTCI rasters ship in are supported: geographic WGS84
//! and UTM zones on the WGS84 or NAD83 datums. The transforms themselves
//! are delegated to `proj4rs`.

use std::fmt;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use serde::Serialize;
use thiserror::Error;

use crate::models::{GeoPoint, ProjectedPoint};

pub const EPSG_WGS84: u32 = 4326;

const WGS84_LONGLAT: &str = "+proj=longlat +datum=WGS84 +no_defs";

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("unsupported coordinate reference system EPSG:{0}")]
    UnsupportedCrs(u32),
    #[error("invalid projection definition `{definition}`: {reason}")]
    Definition { definition: String, reason: String },
    #[error("coordinate ({lat}, {lon}) is outside the projection domain")]
    OutOfDomain { lat: f64, lon: f64 },
    #[error("projected coordinate ({x}, {y}) cannot be inverted")]
    NotInvertible { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Datum {
    Wgs84,
    Nad83,
    Nad83_2011,
}

impl Datum {
    /// proj parameters for the datum. Both NAD83 realizations use a null
    /// shift to WGS84 on GRS80.
    fn proj_params(self) -> &'static str {
        match self {
            Datum::Wgs84 => "+datum=WGS84",
            Datum::Nad83 | Datum::Nad83_2011 => "+ellps=GRS80 +towgs84=0,0,0,0,0,0,0",
        }
    }
}

/// A UTM zone on a given datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtmZone {
    pub zone: u8,
    pub north: bool,
    pub datum: Datum,
}

impl UtmZone {
    /// WGS84 zone containing `point`, by longitude band and hemisphere.
    pub fn for_point(point: GeoPoint) -> Self {
        let band = ((point.lon + 180.0) / 6.0).floor() as i64 + 1;
        Self {
            zone: band.clamp(1, 60) as u8,
            north: point.lat >= 0.0,
            datum: Datum::Wgs84,
        }
    }

    pub fn central_meridian(&self) -> f64 {
        f64::from(self.zone) * 6.0 - 183.0
    }

    /// proj definition of the zone, e.g.
    /// `+proj=utm +zone=14 +datum=WGS84 +units=m +no_defs`.
    pub fn proj_string(&self) -> String {
        let south = if self.north { "" } else { " +south" };
        format!(
            "+proj=utm +zone={}{south} {} +units=m +no_defs",
            self.zone,
            self.datum.proj_params()
        )
    }
}

/// Coordinate reference system of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Crs {
    /// Geographic WGS84; projected x is longitude and y is latitude.
    Geographic,
    Utm(UtmZone),
}

impl Crs {
    pub fn from_epsg(code: u32) -> Result<Self, ProjectionError> {
        let utm = |zone: u32, north: bool, datum: Datum| {
            Crs::Utm(UtmZone {
                zone: zone as u8,
                north,
                datum,
            })
        };
        match code {
            EPSG_WGS84 => Ok(Crs::Geographic),
            32601..=32660 => Ok(utm(code - 32600, true, Datum::Wgs84)),
            32701..=32760 => Ok(utm(code - 32700, false, Datum::Wgs84)),
            26901..=26923 => Ok(utm(code - 26900, true, Datum::Nad83)),
            6328 => Ok(utm(59, true, Datum::Nad83_2011)),
            6329 => Ok(utm(60, true, Datum::Nad83_2011)),
            6330..=6348 => Ok(utm(code - 6329, true, Datum::Nad83_2011)),
            other => Err(ProjectionError::UnsupportedCrs(other)),
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Geographic => EPSG_WGS84,
            Crs::Utm(zone) => {
                let z = u32::from(zone.zone);
                match (zone.datum, zone.north) {
                    (Datum::Wgs84, true) => 32600 + z,
                    (Datum::Wgs84, false) => 32700 + z,
                    (Datum::Nad83, _) => 26900 + z,
                    (Datum::Nad83_2011, _) => match z {
                        59 => 6328,
                        60 => 6329,
                        _ => 6329 + z,
                    },
                }
            }
        }
    }

    /// Build a reusable projector from WGS84 into this system.
    pub fn projector(&self) -> Result<Projector, ProjectionError> {
        match self {
            Crs::Geographic => Ok(Projector::Identity),
            Crs::Utm(zone) => {
                let target = zone.proj_string();
                Ok(Projector::Proj {
                    crs: *self,
                    geographic: parse_proj(WGS84_LONGLAT)?,
                    projected: parse_proj(&target)?,
                })
            }
        }
    }
}

fn parse_proj(definition: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(definition).map_err(|err| ProjectionError::Definition {
        definition: definition.to_string(),
        reason: err.to_string(),
    })
}

/// Forward/inverse mapping between WGS84 and one CRS.
pub enum Projector {
    Identity,
    Proj {
        crs: Crs,
        geographic: Proj,
        projected: Proj,
    },
}

impl fmt::Debug for Projector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projector::Identity => f.write_str("Identity"),
            Projector::Proj { crs, .. } => write!(f, "Proj(EPSG:{})", crs.epsg()),
        }
    }
}

impl Projector {
    pub fn forward(&self, point: GeoPoint) -> Result<ProjectedPoint, ProjectionError> {
        let out_of_domain = || ProjectionError::OutOfDomain {
            lat: point.lat,
            lon: point.lon,
        };
        if !point.is_finite() || point.lat.abs() > 90.0 {
            return Err(out_of_domain());
        }
        match self {
            Projector::Identity => Ok(ProjectedPoint::new(point.lon, point.lat)),
            Projector::Proj {
                geographic,
                projected,
                ..
            } => {
                // Geographic coordinates are radians on both sides of proj4rs.
                let mut xyz = (point.lon.to_radians(), point.lat.to_radians(), 0.0);
                transform(geographic, projected, &mut xyz).map_err(|_| out_of_domain())?;
                if !xyz.0.is_finite() || !xyz.1.is_finite() {
                    return Err(out_of_domain());
                }
                Ok(ProjectedPoint::new(xyz.0, xyz.1))
            }
        }
    }

    pub fn inverse(&self, point: ProjectedPoint) -> Result<GeoPoint, ProjectionError> {
        let not_invertible = || ProjectionError::NotInvertible {
            x: point.x,
            y: point.y,
        };
        match self {
            Projector::Identity => Ok(GeoPoint::new(point.y, point.x)),
            Projector::Proj {
                geographic,
                projected,
                ..
            } => {
                let mut xyz = (point.x, point.y, 0.0);
                transform(projected, geographic, &mut xyz).map_err(|_| not_invertible())?;
                let (lon, lat) = (xyz.0.to_degrees(), xyz.1.to_degrees());
                if !lat.is_finite() || !lon.is_finite() {
                    return Err(not_invertible());
                }
                Ok(GeoPoint::new(lat, lon))
            }
        }
    }
}
