//! Argument groups shared by the binaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use utci_core::{
    LoadOptions, RasterField, RasterFormat, ScoringOptions, DEFAULT_SHADE_PERCENTILE,
    DEFAULT_SPACING_M,
};

/// CRS assumed for rasters that do not declare one (NAD83(2011) / UTM 14N).
pub const DEFAULT_EPSG: u32 = 6343;

#[derive(Args, Debug, Clone)]
pub struct ScoringArgs {
    /// Resample spacing in meters
    #[arg(long, default_value_t = DEFAULT_SPACING_M)]
    pub spacing: f64,

    /// Shade threshold percentile of the batch UTCI range
    #[arg(long, default_value_t = DEFAULT_SHADE_PERCENTILE)]
    pub percentile: f64,
}

impl ScoringArgs {
    pub fn options(&self) -> ScoringOptions {
        ScoringOptions {
            spacing_m: self.spacing,
            shade_percentile: self.percentile,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RasterArgs {
    /// EPSG code used when the raster does not declare a CRS
    #[arg(long, default_value_t = DEFAULT_EPSG)]
    pub epsg: u32,
}

impl RasterArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            fallback_epsg: Some(self.epsg),
        }
    }

    /// Load `path`, inferring the encoding from its extension unless given.
    pub fn load(&self, path: &Path, format: Option<RasterFormat>) -> Result<Arc<dyn RasterField>> {
        let format = match format {
            Some(format) => format,
            None => format_from_extension(path)?,
        };
        let field = utci_core::load(path, format, &self.load_options())
            .with_context(|| format!("loading {} raster {}", format, path.display()))?;
        let geometry = field.geometry();
        tracing::info!(
            path = %path.display(),
            %format,
            rows = geometry.rows,
            cols = geometry.cols,
            epsg = field.crs().epsg(),
            "Loaded raster"
        );
        Ok(field)
    }
}

pub fn format_from_extension(path: &Path) -> Result<RasterFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .with_context(|| format!("cannot infer raster format of {}; pass --format", path.display()))?;
    ext.parse::<RasterFormat>().map_err(anyhow::Error::msg)
}

/// `name.tif` -> `name.npz` next to the input.
pub fn npz_path_for(input: &Path) -> PathBuf {
    input.with_extension("npz")
}
