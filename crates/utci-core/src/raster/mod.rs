//! Gridded UTCI fields and point sampling.
//!
//! A raster comes in one of two encodings: a dense floating-point GeoTIFF
//! (the reference) or a compressed npz archive of `i16` values scaled by a
//! quantization factor. Both decode into a [`RasterField`] and share the
//! same [`GridGeometry`], so the cell picked for a coordinate never depends
//! on the encoding.

mod dense;
mod quantized;

pub use dense::DenseGrid;
pub use quantized::{QuantizedGrid, DEFAULT_SCALE};

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ProjectedPoint;
use crate::projection::{Crs, ProjectionError};

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF decoding failed: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("npz read failed: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),
    #[error("npz write failed: {0}")]
    NpzWrite(#[from] ndarray_npy::WriteNpzError),
    #[error("npz archive has no `{0}` array")]
    MissingArray(String),
    #[error("raster has no georeferencing (pixel scale/tiepoint or model transform)")]
    MissingGeoreference,
    #[error("raster does not declare a CRS and no fallback EPSG was configured")]
    MissingCrs,
    #[error("declared shape {declared:?} does not match grid {actual:?}")]
    ShapeMismatch {
        declared: (usize, usize),
        actual: (usize, usize),
    },
    #[error("raster grid is empty")]
    EmptyGrid,
    #[error("affine transform is not invertible: {0:?}")]
    SingularTransform([f64; 6]),
    #[error("quantization scale must be finite and non-zero, got {0}")]
    InvalidScale(f64),
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),
    #[error("{0}")]
    Projection(#[from] ProjectionError),
}

/// Declared storage encoding of a raster file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterFormat {
    /// Single-band floating-point GeoTIFF.
    GeoTiff,
    /// Compressed npz with `i16` values and a quantization scale.
    QuantizedNpz,
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterFormat::GeoTiff => f.write_str("geotiff"),
            RasterFormat::QuantizedNpz => f.write_str("npz"),
        }
    }
}

impl FromStr for RasterFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geotiff" | "tiff" | "tif" => Ok(RasterFormat::GeoTiff),
            "npz" | "quantized" | "quantized_npz" => Ok(RasterFormat::QuantizedNpz),
            other => Err(format!("unknown raster format `{other}` (expected geotiff or npz)")),
        }
    }
}

/// Options applied while decoding a raster file.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// CRS used when the file does not declare one.
    pub fallback_epsg: Option<u32>,
}

/// Load a raster in its declared encoding.
pub fn load(
    path: impl AsRef<Path>,
    format: RasterFormat,
    options: &LoadOptions,
) -> Result<Arc<dyn RasterField>, RasterError> {
    let path = path.as_ref();
    Ok(match format {
        RasterFormat::GeoTiff => Arc::new(DenseGrid::read_geotiff(path, options)?),
        RasterFormat::QuantizedNpz => Arc::new(QuantizedGrid::read_npz(path, options)?),
    })
}

/// Affine map from grid (row, column) to projected coordinates.
///
/// Coefficients follow the GDAL/rasterio order:
/// `x = a·col + b·row + c`, `y = d·col + e·row + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub fn from_coefficients(c: [f64; 6]) -> Self {
        Self {
            a: c[0],
            b: c[1],
            c: c[2],
            d: c[3],
            e: c[4],
            f: c[5],
        }
    }

    /// North-up grid with its top-left corner at (`origin_x`, `origin_y`).
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            a: pixel_width,
            b: 0.0,
            c: origin_x,
            d: 0.0,
            e: -pixel_height,
            f: origin_y,
        }
    }

    pub fn coefficients(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Projected coordinate of fractional grid position (`row`, `col`).
    pub fn apply(&self, row: f64, col: f64) -> ProjectedPoint {
        ProjectedPoint::new(
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Move the origin from a pixel centre to its top-left corner.
    pub fn shift_half_pixel(&self) -> Self {
        Self {
            c: self.c - (self.a + self.b) / 2.0,
            f: self.f - (self.d + self.e) / 2.0,
            ..*self
        }
    }

    fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }
}

/// Shape, placement and CRS of a grid.
///
/// Shared by every encoding so that cell selection is identical.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridGeometry {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
    #[serde(skip)]
    det: f64,
}

impl GridGeometry {
    pub fn new(
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        crs: Crs,
    ) -> Result<Self, RasterError> {
        if rows == 0 || cols == 0 {
            return Err(RasterError::EmptyGrid);
        }
        let det = transform.determinant();
        let finite = transform.coefficients().iter().all(|c| c.is_finite());
        if !finite || det == 0.0 || !det.is_finite() {
            return Err(RasterError::SingularTransform(transform.coefficients()));
        }
        Ok(Self {
            rows,
            cols,
            transform,
            crs,
            det,
        })
    }

    /// Fractional (row, col) of a projected coordinate.
    pub fn fractional_index(&self, point: ProjectedPoint) -> (f64, f64) {
        let t = &self.transform;
        let dx = point.x - t.c;
        let dy = point.y - t.f;
        let col = (t.e * dx - t.b * dy) / self.det;
        let row = (t.a * dy - t.d * dx) / self.det;
        (row, col)
    }

    /// Cell containing `point`: floor of the fractional index, clamped to
    /// the grid. NaN resolves to index 0.
    pub fn cell_index(&self, point: ProjectedPoint) -> (usize, usize) {
        let (row, col) = self.fractional_index(point);
        (clamp_index(row, self.rows), clamp_index(col, self.cols))
    }
}

fn clamp_index(value: f64, len: usize) -> usize {
    let floored = value.floor();
    if floored.is_nan() || floored <= 0.0 {
        0
    } else if floored >= len as f64 {
        len - 1
    } else {
        floored as usize
    }
}

/// A read-only 2-D field sampled by projected coordinate.
pub trait RasterField: Send + Sync + fmt::Debug {
    fn geometry(&self) -> &GridGeometry;

    fn format(&self) -> RasterFormat;

    /// Physical value of cell (`row`, `col`). Indices must be in bounds.
    fn value_at(&self, row: usize, col: usize) -> f64;

    fn crs(&self) -> Crs {
        self.geometry().crs
    }

    /// Value of the cell containing `point`, without interpolation.
    fn sample(&self, point: ProjectedPoint) -> f64 {
        let (row, col) = self.geometry().cell_index(point);
        self.value_at(row, col)
    }
}
