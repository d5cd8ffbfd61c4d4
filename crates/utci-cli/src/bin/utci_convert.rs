//! Convert a UTCI GeoTIFF to the quantized npz encoding.
//!
//! Values are stored as `round(utci * scale)` in int16 alongside the affine
//! transform, grid shape, scale and EPSG code. A scale of 100 keeps route
//! ranks in step with the GeoTIFF; 10 can flip close routes.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use utci_cli::args::{npz_path_for, RasterArgs};
use utci_core::{DenseGrid, QuantizedGrid, RasterField, DEFAULT_SCALE};

/// Convert a UTCI GeoTIFF to quantized int16 npz
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input GeoTIFF
    #[arg(default_value = "UTCI_1600.tif")]
    input: PathBuf,

    /// Output npz (default: input with an .npz extension)
    output: Option<PathBuf>,

    /// Quantization scale; stored value = round(utci * scale)
    #[arg(long, default_value_t = DEFAULT_SCALE)]
    scale: f64,

    #[command(flatten)]
    raster: RasterArgs,
}

const MIB: f64 = 1024.0 * 1024.0;

fn main() -> anyhow::Result<()> {
    utci_cli::init_tracing();
    let args = Args::parse();

    if !args.input.exists() {
        bail!("input file not found: {}", args.input.display());
    }
    let output = args.output.clone().unwrap_or_else(|| npz_path_for(&args.input));

    println!("Reading {}...", args.input.display());
    let dense = DenseGrid::read_geotiff(&args.input, &args.raster.load_options())
        .with_context(|| format!("reading {}", args.input.display()))?;
    let quantized = QuantizedGrid::from_dense(&dense, args.scale)?;

    let geometry = dense.geometry();
    let cells = dense.values().len() as f64;
    println!(
        "Shape: ({}, {}), EPSG:{}, UTCI scale: {} (divide stored values by {} when reading)",
        geometry.rows,
        geometry.cols,
        geometry.crs.epsg(),
        args.scale,
        args.scale
    );
    println!(
        "Size: int16 {:.2} MB (was float32 {:.2} MB)",
        cells * 2.0 / MIB,
        cells * 4.0 / MIB
    );

    let max_error = dense
        .values()
        .iter()
        .zip(quantized.raw_values())
        .filter(|(v, _)| v.is_finite())
        .map(|(&v, &q)| (f64::from(v) - f64::from(q) / args.scale).abs())
        .fold(0.0f64, f64::max);
    println!("Max quantization error: {max_error:.4}");
    if max_error > 0.5 / args.scale + 1e-6 {
        tracing::warn!(
            max_error,
            "Some values were clamped to the int16 range; lower --scale"
        );
    }

    quantized
        .write_npz(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    let size = std::fs::metadata(&output)
        .map(|m| m.len() as f64 / MIB)
        .unwrap_or(0.0);
    println!("Saved {} ({size:.2} MB)", output.display());
    println!("Serve it with UTCI_RASTER_FORMAT=npz and UTCI_RASTER_PATH or UTCI_RASTER_URL.");
    Ok(())
}
