//! Check that the GeoTIFF and quantized npz encodings score a batch of
//! routes the same way: identical ranks, means and shade percentages within
//! tolerance. With `--api`, the same leg is also scored by a running server
//! and checked against the GeoTIFF results. Exits non-zero on disagreement.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use utci_cli::api;
use utci_cli::report::comparison_table;
use utci_cli::{RasterArgs, RouteInput, ScoringArgs};
use utci_core::{
    compare_batches, score_encoded_paths, EncodingComparison, NoopSink, RasterFormat, ScoredBatch,
    Tolerance,
};

/// Compare route scores between the .tif and .npz encodings
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Reference GeoTIFF
    #[arg(long, default_value = "UTCI_1600.tif")]
    tif: PathBuf,

    /// Quantized candidate
    #[arg(long, default_value = "UTCI_1600.npz")]
    npz: PathBuf,

    #[command(flatten)]
    routes: RouteInput,

    #[command(flatten)]
    scoring: ScoringArgs,

    #[command(flatten)]
    raster: RasterArgs,

    /// Largest accepted |mean UTCI| difference
    #[arg(long, default_value_t = Tolerance::default().mean)]
    tol_mean: f64,

    /// Largest accepted shade percentage difference, in points
    #[arg(long, default_value_t = Tolerance::default().shade_pct)]
    tol_shade: f64,

    /// Print the comparison as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Base URL of a running server (e.g. http://localhost:5001) whose
    /// /api/process-route results are checked against the .tif scoring;
    /// needs exactly one --leg and no other route input
    #[arg(long, value_name = "URL")]
    api: Option<String>,
}

fn warn_skipped(encoding: &str, scored: &ScoredBatch) {
    for skipped in &scored.skipped {
        tracing::warn!(encoding, route_id = skipped.route_id, reason = %skipped.reason, "Skipped route");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utci_cli::init_tracing();
    let args = Args::parse();

    for (path, hint) in [
        (&args.tif, "need both encodings"),
        (&args.npz, "run utci-convert first"),
    ] {
        if !path.exists() {
            bail!("missing {} ({hint})", path.display());
        }
    }

    let api_leg = match &args.api {
        Some(_) => Some(api::single_leg(&args.routes)?.clone()),
        None => None,
    };

    let paths = args.routes.collect().await?;
    println!("Total routes: {}", paths.len());
    let labels: Vec<String> = paths.iter().map(|p| p.label.clone()).collect();
    let encoded: Vec<String> = paths.into_iter().map(|p| p.encoded).collect();
    let options = args.scoring.options();

    let tif = args.raster.load(&args.tif, Some(RasterFormat::GeoTiff))?;
    let npz = args.raster.load(&args.npz, Some(RasterFormat::QuantizedNpz))?;

    println!("Scoring with .tif...");
    let reference = score_encoded_paths(&encoded, tif.as_ref(), &NoopSink, &options);
    warn_skipped("geotiff", &reference);
    println!("Scoring with .npz...");
    let candidate = score_encoded_paths(&encoded, npz.as_ref(), &NoopSink, &options);
    warn_skipped("npz", &candidate);

    let tolerance = Tolerance {
        mean: args.tol_mean,
        shade_pct: args.tol_shade,
    };
    let comparison = compare_batches(&reference.stats, &candidate.stats, &tolerance);

    let server = match (&args.api, &api_leg) {
        (Some(base_url), Some(leg)) => {
            println!("Scoring through {base_url}...");
            let response = api::process_route(base_url, &leg.origin, &leg.destination).await?;
            let stats = response.batch_stats();
            let comparison = compare_batches(&reference.stats, &stats, &tolerance);
            Some((stats, comparison))
        }
        _ => None,
    };

    if args.json {
        let mut report = serde_json::json!({
            "tolerance": tolerance,
            "comparison": comparison,
            "reference": reference.stats,
            "candidate": candidate.stats,
            "skipped": reference.skipped,
        });
        if let Some((stats, api_comparison)) = &server {
            report["api"] = serde_json::json!({
                "comparison": api_comparison,
                "stats": stats,
            });
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serializing report")?
        );
    } else {
        print!(
            "{}",
            comparison_table(
                ["tif", "npz"],
                &labels,
                &reference.stats,
                &candidate.stats,
                &comparison,
                &tolerance
            )
        );
        if let Some((stats, api_comparison)) = &server {
            print!(
                "{}",
                comparison_table(
                    ["tif", "api"],
                    &labels,
                    &reference.stats,
                    stats,
                    api_comparison,
                    &tolerance
                )
            );
        }
    }

    let failed = |c: &EncodingComparison| c.routes.iter().filter(|r| !r.passed).count();
    if !comparison.passed {
        bail!("encodings disagree on {} route(s)", failed(&comparison));
    }
    if let Some((_, api_comparison)) = &server {
        if !api_comparison.passed {
            bail!("server disagrees with local scoring on {} route(s)", failed(api_comparison));
        }
    }
    Ok(())
}
