//! Quantized npz rasters.
//!
//! Archive layout: `values` (`i16`, rows x cols, `round(v * scale)`),
//! `transform` (six affine coefficients), `shape` (`[rows, cols]`),
//! `scale` (scalar) and an optional scalar `epsg`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{arr0, Array1, Array2, ArrayD, Ix1, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadableElement};

use super::{
    DenseGrid, GeoTransform, GridGeometry, LoadOptions, RasterError, RasterField, RasterFormat,
};
use crate::projection::Crs;

/// Quantization factor used by `utci-convert` unless told otherwise.
pub const DEFAULT_SCALE: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct QuantizedGrid {
    geometry: GridGeometry,
    values: Vec<i16>,
    scale: f64,
}

impl QuantizedGrid {
    pub fn new(geometry: GridGeometry, values: Vec<i16>, scale: f64) -> Result<Self, RasterError> {
        if !scale.is_finite() || scale == 0.0 {
            return Err(RasterError::InvalidScale(scale));
        }
        if values.len() != geometry.rows * geometry.cols {
            return Err(RasterError::ShapeMismatch {
                declared: (geometry.rows, geometry.cols),
                actual: (values.len() / geometry.cols.max(1), geometry.cols),
            });
        }
        Ok(Self {
            geometry,
            values,
            scale,
        })
    }

    /// Quantize a dense grid. Values outside the `i16` range saturate.
    pub fn from_dense(dense: &DenseGrid, scale: f64) -> Result<Self, RasterError> {
        let values = dense
            .values()
            .iter()
            .map(|v| (f64::from(*v) * scale).round() as i16)
            .collect();
        Self::new(dense.geometry().clone(), values, scale)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn raw_values(&self) -> &[i16] {
        &self.values
    }

    pub fn read_npz(path: &Path, options: &LoadOptions) -> Result<Self, RasterError> {
        let file = File::open(path)?;
        let mut npz = NpzReader::new(BufReader::new(file))?;
        let names = npz.names()?;

        let values: Array2<i16> = read_entry(&mut npz, &names, "values")?;
        let transform: ArrayD<f64> = read_entry(&mut npz, &names, "transform")?;
        let scale: ArrayD<f64> = read_entry(&mut npz, &names, "scale")?;
        let declared = read_shape(&mut npz, &names)?;
        let epsg = match entry_name(&names, "epsg") {
            Some(name) => {
                let code: ArrayD<i32> = npz.by_name(name)?;
                code.iter().next().map(|c| *c as u32)
            }
            None => None,
        };

        let (rows, cols) = values.dim();
        if let Some(declared) = declared {
            if declared != (rows, cols) {
                return Err(RasterError::ShapeMismatch {
                    declared,
                    actual: (rows, cols),
                });
            }
        }

        let coefficients: Vec<f64> = transform.iter().copied().collect();
        let coefficients: [f64; 6] = coefficients
            .get(..6)
            .and_then(|c| c.try_into().ok())
            .ok_or(RasterError::MissingGeoreference)?;
        let scale = scale
            .iter()
            .next()
            .copied()
            .ok_or_else(|| RasterError::MissingArray("scale".to_string()))?;

        let epsg = epsg.or(options.fallback_epsg).ok_or(RasterError::MissingCrs)?;
        let geometry = GridGeometry::new(
            rows,
            cols,
            GeoTransform::from_coefficients(coefficients),
            Crs::from_epsg(epsg)?,
        )?;
        Self::new(geometry, values.iter().copied().collect(), scale)
    }

    /// Write the grid as a compressed npz archive.
    pub fn write_npz(&self, path: &Path) -> Result<(), RasterError> {
        let (rows, cols) = (self.geometry.rows, self.geometry.cols);
        let values = Array2::from_shape_vec((rows, cols), self.values.clone()).map_err(|_| {
            RasterError::ShapeMismatch {
                declared: (rows, cols),
                actual: (self.values.len() / cols.max(1), cols),
            }
        })?;

        let file = File::create(path)?;
        let mut npz = NpzWriter::new_compressed(BufWriter::new(file));
        npz.add_array("values", &values)?;
        npz.add_array(
            "transform",
            &Array1::from(self.geometry.transform.coefficients().to_vec()),
        )?;
        npz.add_array("shape", &Array1::from(vec![rows as i32, cols as i32]))?;
        npz.add_array("scale", &arr0(self.scale))?;
        npz.add_array("epsg", &arr0(self.geometry.crs.epsg() as i32))?;
        npz.finish()?;
        Ok(())
    }
}

impl RasterField for QuantizedGrid {
    fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn format(&self) -> RasterFormat {
        RasterFormat::QuantizedNpz
    }

    fn value_at(&self, row: usize, col: usize) -> f64 {
        f64::from(self.values[row * self.geometry.cols + col]) / self.scale
    }
}

/// Archive entry for `key`, with or without numpy's `.npy` suffix.
fn entry_name<'a>(names: &'a [String], key: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|n| n.as_str() == key || n.strip_suffix(".npy") == Some(key))
        .map(String::as_str)
}

fn read_entry<A, D>(
    npz: &mut NpzReader<BufReader<File>>,
    names: &[String],
    key: &str,
) -> Result<ndarray::Array<A, D>, RasterError>
where
    A: ReadableElement,
    D: ndarray::Dimension,
{
    let name = entry_name(names, key).ok_or_else(|| RasterError::MissingArray(key.to_string()))?;
    Ok(npz.by_name(name)?)
}

/// Declared `[rows, cols]`, stored as `int32` or `int64`.
fn read_shape(
    npz: &mut NpzReader<BufReader<File>>,
    names: &[String],
) -> Result<Option<(usize, usize)>, RasterError> {
    let Some(name) = entry_name(names, "shape") else {
        return Ok(None);
    };
    let dims: Vec<i64> = match npz.by_name::<OwnedRepr<i32>, Ix1>(name) {
        Ok(shape) => shape.iter().map(|d| i64::from(*d)).collect(),
        Err(_) => {
            let shape: Array1<i64> = npz.by_name(name)?;
            shape.to_vec()
        }
    };
    match dims.as_slice() {
        [rows, cols, ..] if *rows >= 0 && *cols >= 0 => Ok(Some((*rows as usize, *cols as usize))),
        _ => Err(RasterError::MissingArray("shape".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProjectedPoint;
    use crate::raster::dense::tests::write_geotiff;
    use crate::raster::test_support::{geometry, temp_path, values};

    fn dense() -> DenseGrid {
        DenseGrid::new(geometry(), values()).unwrap()
    }

    #[test]
    fn quantizes_with_rounding() {
        let q = QuantizedGrid::from_dense(&dense(), DEFAULT_SCALE).unwrap();
        // 30.0 + 3 * 0.137 = 30.411
        assert_eq!(q.raw_values()[3], 3041);
        assert!((q.value_at(0, 3) - 30.41).abs() < 1e-9);
    }

    #[test]
    fn saturates_outside_i16_range() {
        let mut v = values();
        v[0] = 1.0e6;
        v[1] = -1.0e6;
        let d = DenseGrid::new(geometry(), v).unwrap();
        let q = QuantizedGrid::from_dense(&d, DEFAULT_SCALE).unwrap();
        assert_eq!(q.raw_values()[0], i16::MAX);
        assert_eq!(q.raw_values()[1], i16::MIN);
    }

    #[test]
    fn rejects_bad_scale_and_shape() {
        assert!(matches!(
            QuantizedGrid::new(geometry(), vec![0; 20], 0.0),
            Err(RasterError::InvalidScale(_))
        ));
        assert!(matches!(
            QuantizedGrid::new(geometry(), vec![0; 19], 100.0),
            Err(RasterError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn npz_preserves_grid() {
        let path = temp_path("npz");
        let q = QuantizedGrid::from_dense(&dense(), DEFAULT_SCALE).unwrap();
        q.write_npz(&path).unwrap();

        let back = QuantizedGrid::read_npz(&path, &LoadOptions::default()).unwrap();
        assert_eq!(back.geometry(), q.geometry());
        assert_eq!(back.raw_values(), q.raw_values());
        assert_eq!(back.scale(), DEFAULT_SCALE);
        assert_eq!(back.crs().epsg(), 6343);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_npz_is_io_error() {
        let err = QuantizedGrid::read_npz(&temp_path("npz"), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, RasterError::Io(_)));
    }

    #[test]
    fn encodings_agree_within_half_a_step() {
        let tif = temp_path("tif");
        let npz = temp_path("npz");
        write_geotiff(&tif, &geometry(), &values(), Some(6343));
        let options = LoadOptions::default();

        let reference = crate::raster::load(&tif, RasterFormat::GeoTiff, &options).unwrap();
        let quantized = QuantizedGrid::from_dense(&dense(), DEFAULT_SCALE).unwrap();
        quantized.write_npz(&npz).unwrap();
        let candidate = crate::raster::load(&npz, RasterFormat::QuantizedNpz, &options).unwrap();
        assert_eq!(candidate.format(), RasterFormat::QuantizedNpz);

        for i in 0..60 {
            let p = ProjectedPoint::new(
                599_990.0 + i as f64 * 1.3,
                3_350_010.0 - i as f64 * 0.9,
            );
            assert_eq!(
                reference.geometry().cell_index(p),
                candidate.geometry().cell_index(p)
            );
            let diff = (reference.sample(p) - candidate.sample(p)).abs();
            assert!(diff <= 0.5 / DEFAULT_SCALE + 1e-6, "diff {diff} at {p:?}");
        }
        std::fs::remove_file(tif).ok();
        std::fs::remove_file(npz).ok();
    }
}
