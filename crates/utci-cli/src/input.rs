//! Where the encoded polylines come from: arguments, a file, or live
//! walking directions for an origin/destination pair.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Args;
use utci_providers::{DirectionsProvider, Geocoder, GoogleMapsClient, GoogleMapsConfig};

/// An origin/destination pair written as `origin|destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub origin: String,
    pub destination: String,
}

impl FromStr for Leg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((origin, destination)) = s.split_once('|') else {
            return Err(format!("expected `origin|destination`, got `{s}`"));
        };
        let (origin, destination) = (origin.trim(), destination.trim());
        if origin.is_empty() || destination.is_empty() {
            return Err(format!("leg `{s}` has an empty endpoint"));
        }
        Ok(Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
        })
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RouteInput {
    /// Encoded polyline (repeatable)
    #[arg(long = "polyline")]
    pub polylines: Vec<String>,

    /// File with one encoded polyline per line; `#` starts a comment
    #[arg(long)]
    pub polyline_file: Option<PathBuf>,

    /// Fetch walking alternatives for `origin|destination` (repeatable, needs GOOGLE_MAPS_API_KEY)
    #[arg(long = "leg")]
    pub legs: Vec<Leg>,
}

/// One path to score, labelled for reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledPath {
    pub label: String,
    pub encoded: String,
}

impl RouteInput {
    /// Every path in argument order: inline polylines, file lines, then legs.
    pub async fn collect(&self) -> Result<Vec<LabelledPath>> {
        let mut paths: Vec<LabelledPath> = self
            .polylines
            .iter()
            .enumerate()
            .map(|(i, encoded)| LabelledPath {
                label: format!("--polyline #{}", i + 1),
                encoded: encoded.clone(),
            })
            .collect();

        if let Some(file) = &self.polyline_file {
            paths.extend(read_polyline_file(file)?);
        }

        if !self.legs.is_empty() {
            let client = google_client()?;
            for leg in &self.legs {
                paths.extend(leg_paths(&client, &client, leg).await?);
            }
        }

        if paths.is_empty() {
            bail!("no routes given; use --polyline, --polyline-file or --leg");
        }
        Ok(paths)
    }
}

pub fn read_polyline_file(path: &Path) -> Result<Vec<LabelledPath>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading polylines from {}", path.display()))?;
    Ok(parse_polyline_lines(&text, &path.display().to_string()))
}

fn parse_polyline_lines(text: &str, source: &str) -> Vec<LabelledPath> {
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            Some(LabelledPath {
                label: format!("{}:{}", source, n + 1),
                encoded: line.to_string(),
            })
        })
        .collect()
}

fn google_client() -> Result<GoogleMapsClient> {
    let api_key = std::env::var("GOOGLE_MAPS_API_KEY").unwrap_or_default();
    if api_key.trim().is_empty() {
        bail!("--leg needs GOOGLE_MAPS_API_KEY to be set");
    }
    let mut config = GoogleMapsConfig {
        api_key,
        ..GoogleMapsConfig::default()
    };
    if let Ok(base_url) = std::env::var("UTCI_MAPS_BASE_URL") {
        config.base_url = base_url;
    }
    Ok(GoogleMapsClient::new(config)?)
}

/// Geocode both ends of `leg` and return every walking alternative.
pub async fn leg_paths(
    geocoder: &dyn Geocoder,
    directions: &dyn DirectionsProvider,
    leg: &Leg,
) -> Result<Vec<LabelledPath>> {
    tracing::info!(%leg, "Fetching walking alternatives");
    let origin = geocoder
        .geocode(&leg.origin)
        .await
        .with_context(|| format!("geocoding `{}`", leg.origin))?;
    let destination = geocoder
        .geocode(&leg.destination)
        .await
        .with_context(|| format!("geocoding `{}`", leg.destination))?;

    let routes = directions
        .directions(origin, destination)
        .await
        .with_context(|| format!("directions for {leg}"))?;
    if routes.is_empty() {
        bail!("no walking routes for {leg}");
    }
    Ok(routes
        .into_iter()
        .enumerate()
        .map(|(i, route)| LabelledPath {
            label: format!("{leg} (alt {})", i + 1),
            encoded: route.encoded_path,
        })
        .collect())
}
