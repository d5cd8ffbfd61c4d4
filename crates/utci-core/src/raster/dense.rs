//! Dense floating-point GeoTIFF rasters.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

use super::{GeoTransform, GridGeometry, LoadOptions, RasterError, RasterField, RasterFormat};
use crate::projection::{Crs, EPSG_WGS84};

const KEY_RASTER_TYPE: u32 = 1025;
const KEY_GEOGRAPHIC_TYPE: u32 = 2048;
const KEY_PROJECTED_CS_TYPE: u32 = 3072;
const RASTER_PIXEL_IS_POINT: u32 = 2;
const USER_DEFINED: u32 = 32767;

/// Reference encoding: one `f32` per cell, row-major.
#[derive(Debug, Clone)]
pub struct DenseGrid {
    geometry: GridGeometry,
    values: Vec<f32>,
}

impl DenseGrid {
    pub fn new(geometry: GridGeometry, values: Vec<f32>) -> Result<Self, RasterError> {
        let expected = geometry.rows * geometry.cols;
        if values.len() != expected {
            return Err(RasterError::ShapeMismatch {
                declared: (geometry.rows, geometry.cols),
                actual: (values.len() / geometry.cols.max(1), geometry.cols),
            });
        }
        Ok(Self { geometry, values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Read the first band of a GeoTIFF along with its georeferencing.
    pub fn read_geotiff(path: &Path, options: &LoadOptions) -> Result<Self, RasterError> {
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());
        let (width, height) = decoder.dimensions()?;
        let (rows, cols) = (height as usize, width as usize);

        let model_transform = optional_f64s(&mut decoder, Tag::ModelTransformationTag)?;
        let pixel_scale = optional_f64s(&mut decoder, Tag::ModelPixelScaleTag)?;
        let tiepoint = optional_f64s(&mut decoder, Tag::ModelTiepointTag)?;
        let geokeys = match decoder.find_tag(Tag::GeoKeyDirectoryTag)? {
            Some(value) => parse_geokeys(&value.into_u32_vec()?),
            None => GeoKeys::default(),
        };

        let mut transform = transform_from_tags(
            model_transform.as_deref(),
            pixel_scale.as_deref(),
            tiepoint.as_deref(),
        )
        .ok_or(RasterError::MissingGeoreference)?;
        if geokeys.raster_type == Some(RASTER_PIXEL_IS_POINT) {
            transform = transform.shift_half_pixel();
        }

        let epsg = geokeys
            .epsg()
            .or(options.fallback_epsg)
            .ok_or(RasterError::MissingCrs)?;
        let geometry = GridGeometry::new(rows, cols, transform, Crs::from_epsg(epsg)?)?;

        let samples = first_band(decoder.read_image()?, rows * cols)?;
        Self::new(geometry, samples)
    }
}

impl RasterField for DenseGrid {
    fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn format(&self) -> RasterFormat {
        RasterFormat::GeoTiff
    }

    fn value_at(&self, row: usize, col: usize) -> f64 {
        f64::from(self.values[row * self.geometry.cols + col])
    }
}

fn optional_f64s<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>, RasterError> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

/// Build the pixel-to-model transform from GeoTIFF tags.
///
/// A full model transformation wins; otherwise the first tiepoint plus
/// the pixel scale describe a north-up grid.
fn transform_from_tags(
    model_transform: Option<&[f64]>,
    pixel_scale: Option<&[f64]>,
    tiepoint: Option<&[f64]>,
) -> Option<GeoTransform> {
    if let Some(m) = model_transform.filter(|m| m.len() >= 16) {
        return Some(GeoTransform::from_coefficients([
            m[0], m[1], m[3], m[4], m[5], m[7],
        ]));
    }
    let scale = pixel_scale.filter(|s| s.len() >= 2)?;
    let tie = tiepoint.filter(|t| t.len() >= 6)?;
    let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
    Some(GeoTransform {
        a: scale[0],
        b: 0.0,
        c: x - i * scale[0],
        d: 0.0,
        e: -scale[1],
        f: y + j * scale[1],
    })
}

#[derive(Debug, Default, PartialEq)]
struct GeoKeys {
    raster_type: Option<u32>,
    geographic: Option<u32>,
    projected: Option<u32>,
}

impl GeoKeys {
    fn epsg(&self) -> Option<u32> {
        self.projected
            .filter(|code| *code != USER_DEFINED)
            .or(self.geographic.filter(|code| *code == EPSG_WGS84))
    }
}

/// Read the inline SHORT values of a GeoKeyDirectory.
fn parse_geokeys(directory: &[u32]) -> GeoKeys {
    let mut keys = GeoKeys::default();
    let Some(header) = directory.get(..4) else {
        return keys;
    };
    let count = header[3] as usize;
    for entry in directory[4..].chunks_exact(4).take(count) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match id {
            KEY_RASTER_TYPE => keys.raster_type = Some(value),
            KEY_GEOGRAPHIC_TYPE => keys.geographic = Some(value),
            KEY_PROJECTED_CS_TYPE => keys.projected = Some(value),
            _ => {}
        }
    }
    keys
}

/// Widen decoded samples to `f32` and keep only the first band.
fn first_band(image: DecodingResult, cells: usize) -> Result<Vec<f32>, RasterError> {
    let all: Vec<f32> = match image {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        _ => {
            return Err(RasterError::UnsupportedSampleFormat(
                "64-bit or unsigned 32-bit integer samples".to_string(),
            ))
        }
    };
    if cells == 0 || all.len() < cells {
        return Err(RasterError::EmptyGrid);
    }
    let bands = all.len() / cells;
    if bands <= 1 {
        return Ok(all);
    }
    Ok(all.into_iter().step_by(bands).take(cells).collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ProjectedPoint;
    use crate::raster::test_support::{geometry, temp_path, values};
    use tiff::encoder::{colortype, TiffEncoder};

    /// Write a single-band float GeoTIFF with scale/tiepoint georeferencing.
    pub(crate) fn write_geotiff(
        path: &Path,
        geometry: &GridGeometry,
        values: &[f32],
        epsg: Option<u16>,
    ) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(geometry.cols as u32, geometry.rows as u32)
            .unwrap();
        let t = geometry.transform;
        let scale = [t.a, -t.e, 0.0];
        let tiepoint = [0.0, 0.0, 0.0, t.c, t.f, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .unwrap();
        if let Some(code) = epsg {
            let keys: [u16; 12] = [1, 1, 0, 2, 1025, 0, 1, 1, 3072, 0, 1, code];
            image
                .encoder()
                .write_tag(Tag::GeoKeyDirectoryTag, &keys[..])
                .unwrap();
        }
        image.write_data(values).unwrap();
    }

    #[test]
    fn reads_geotiff_values_and_georeference() {
        let path = temp_path("tif");
        let geometry = geometry();
        write_geotiff(&path, &geometry, &values(), Some(6343));

        let grid = DenseGrid::read_geotiff(&path, &LoadOptions::default()).unwrap();
        assert_eq!(grid.geometry().rows, 4);
        assert_eq!(grid.geometry().cols, 5);
        assert_eq!(grid.geometry().transform, geometry.transform);
        assert_eq!(grid.crs().epsg(), 6343);
        assert_eq!(grid.value_at(2, 3), f64::from(values()[13]));

        let p = ProjectedPoint::new(600_035.0, 3_349_975.0);
        assert_eq!(grid.sample(p), f64::from(values()[13]));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_crs_uses_fallback() {
        let path = temp_path("tif");
        write_geotiff(&path, &geometry(), &values(), None);

        let err = DenseGrid::read_geotiff(&path, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, RasterError::MissingCrs));

        let options = LoadOptions {
            fallback_epsg: Some(32614),
        };
        let grid = DenseGrid::read_geotiff(&path, &options).unwrap();
        assert_eq!(grid.crs().epsg(), 32614);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = DenseGrid::read_geotiff(&temp_path("tif"), &LoadOptions::default()).unwrap_err();
        match err {
            RasterError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn model_transformation_wins_over_tiepoint() {
        let m = [
            2.0, 0.0, 0.0, 100.0, //
            0.0, -2.0, 0.0, 500.0, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let t = transform_from_tags(Some(&m), Some(&[9.0, 9.0, 0.0]), Some(&[0.0; 6])).unwrap();
        assert_eq!(t, GeoTransform::north_up(100.0, 500.0, 2.0, 2.0));
    }

    #[test]
    fn tiepoint_at_interior_pixel() {
        let t = transform_from_tags(
            None,
            Some(&[10.0, 10.0, 0.0]),
            Some(&[2.0, 3.0, 0.0, 1020.0, 4970.0, 0.0]),
        )
        .unwrap();
        assert_eq!(t, GeoTransform::north_up(1000.0, 5000.0, 10.0, 10.0));
        assert_eq!(transform_from_tags(None, None, Some(&[0.0; 6])), None);
    }

    #[test]
    fn geokeys_prefer_projected_code() {
        let keys = parse_geokeys(&[1, 1, 0, 3, 1025, 0, 1, 2, 2048, 0, 1, 4326, 3072, 0, 1, 6343]);
        assert_eq!(keys.raster_type, Some(2));
        assert_eq!(keys.epsg(), Some(6343));

        let geographic = parse_geokeys(&[1, 1, 0, 1, 2048, 0, 1, 4326]);
        assert_eq!(geographic.epsg(), Some(4326));

        let user_defined = parse_geokeys(&[1, 1, 0, 1, 3072, 0, 1, 32767]);
        assert_eq!(user_defined.epsg(), None);
        assert_eq!(parse_geokeys(&[1, 1]), GeoKeys::default());
    }

    #[test]
    fn keeps_first_band_of_interleaved_samples() {
        let image = DecodingResult::F32(vec![1.0, 9.0, 2.0, 9.0, 3.0, 9.0]);
        assert_eq!(first_band(image, 3).unwrap(), vec![1.0, 2.0, 3.0]);
    }
}
