//! Score encoded polylines against a UTCI raster without the HTTP server.
//!
//! Prints one JSON document with per-route statistics, the batch shade
//! threshold and any routes that could not be scored.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use utci_cli::{RasterArgs, RouteInput, ScoringArgs};
use utci_core::{score_encoded_paths, NoopSink, RasterFormat};

/// Score walking routes by mean UTCI and shade
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// UTCI raster (.tif or .npz)
    #[arg(long, default_value = "UTCI_1600.tif")]
    raster_path: PathBuf,

    /// Raster encoding; inferred from the extension when omitted
    #[arg(long)]
    format: Option<RasterFormat>,

    #[command(flatten)]
    routes: RouteInput,

    #[command(flatten)]
    scoring: ScoringArgs,

    #[command(flatten)]
    raster: RasterArgs,

    /// Include resampled points and their values
    #[arg(long)]
    points: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utci_cli::init_tracing();
    let args = Args::parse();

    let paths = args.routes.collect().await?;
    let field = args.raster.load(&args.raster_path, args.format)?;
    let encoded: Vec<&str> = paths.iter().map(|p| p.encoded.as_str()).collect();
    let scored = score_encoded_paths(&encoded, field.as_ref(), &NoopSink, &args.scoring.options());

    let routes: Vec<_> = scored
        .stats
        .routes
        .iter()
        .map(|stats| {
            let mut entry = json!({
                "label": paths.get(stats.route_id).map(|p| p.label.as_str()),
                "stats": stats,
            });
            if args.points {
                if let Some(sampled) = scored.sampled_route(stats.route_id) {
                    entry["points"] = json!(sampled
                        .points
                        .iter()
                        .map(|p| [p.lat, p.lon])
                        .collect::<Vec<_>>());
                    entry["values"] = json!(sampled.values);
                }
            }
            entry
        })
        .collect();

    for skipped in &scored.skipped {
        tracing::warn!(route_id = skipped.route_id, reason = %skipped.reason, "Skipped route");
    }

    let report = json!({
        "routes": routes,
        "shade_threshold": scored.stats.shade_threshold,
        "utci_range": scored.stats.mean_range,
        "skipped_routes": scored.skipped,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing scores")?
    );
    Ok(())
}
