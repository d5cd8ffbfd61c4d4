//! Client for a running UTCI server's `/api/process-route`, used to check
//! what the service returns against local scoring.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use utci_core::{BatchStats, RouteStats, ValueRange};

use crate::input::{Leg, RouteInput};

/// Whole-request limit for one scoring call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct ApiRoute {
    pub route_id: usize,
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    pub mean_utci: Option<f64>,
    pub min_utci: Option<f64>,
    pub max_utci: Option<f64>,
    pub normalized_utci: Option<f64>,
    pub shade_percentage: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub routes: Vec<ApiRoute>,
    pub utci_range: Option<ValueRange>,
    pub shade_threshold: Option<f64>,
}

impl ApiResponse {
    /// Server results in the shape local scoring produces, so both can go
    /// through `compare_batches`.
    pub fn batch_stats(&self) -> BatchStats {
        let routes = self
            .routes
            .iter()
            .map(|r| RouteStats {
                route_id: r.route_id,
                point_count: r.coordinates.len(),
                mean: r.mean_utci,
                min: r.min_utci,
                max: r.max_utci,
                normalized_score: r.normalized_utci,
                shade_percentage: r.shade_percentage,
                rank: r.rank,
            })
            .collect();
        BatchStats {
            routes,
            shade_threshold: self.shade_threshold,
            overall: None,
            mean_range: self.utci_range,
        }
    }
}

/// The server fetches its own alternatives, so route ids only line up with
/// local scoring when the input is a single leg.
pub fn single_leg(input: &RouteInput) -> Result<&Leg> {
    match input.legs.as_slice() {
        [leg] if input.polylines.is_empty() && input.polyline_file.is_none() => Ok(leg),
        _ => bail!("--api needs exactly one --leg and no other route input"),
    }
}

/// POST `origin`/`destination` to `{base_url}/api/process-route`.
pub async fn process_route(base_url: &str, origin: &str, destination: &str) -> Result<ApiResponse> {
    let url = format!("{}/api/process-route", base_url.trim_end_matches('/'));
    tracing::info!(%url, origin, destination, "Calling route scoring API");
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("building HTTP client")?;
    let response = client
        .post(&url)
        .json(&json!({ "origin": origin, "destination": destination }))
        .send()
        .await
        .with_context(|| format!("POST {url}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{url} returned HTTP {status}: {body}");
    }
    response
        .json()
        .await
        .with_context(|| format!("decoding response from {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use utci_core::{compare_batches, Tolerance};

    const RESPONSE: &str = r#"{
        "routes": [
            {
                "route_id": 0,
                "coordinates": [[30.27, -97.74], [30.28, -97.74], [30.29, -97.74]],
                "mean_utci": 31.25,
                "min_utci": 30.0,
                "max_utci": 32.5,
                "normalized_utci": 100.0,
                "utci_values": [30.0, 31.25, 32.5],
                "shade_percentage": 66.67,
                "rank": 1,
                "duration": "14 mins",
                "distance": "1.1 km"
            },
            {
                "route_id": 2,
                "coordinates": [[30.27, -97.73], [30.29, -97.73]],
                "mean_utci": 30.5,
                "min_utci": 30.0,
                "max_utci": 31.0,
                "normalized_utci": 0.0,
                "utci_values": [30.0, 31.0],
                "shade_percentage": 100.0,
                "rank": 0,
                "duration": "12 mins",
                "distance": "1.0 km"
            }
        ],
        "origin": { "lat": 30.2747, "lng": -97.7404 },
        "destination": { "lat": 30.2862, "lng": -97.7394 },
        "utci_range": { "min": 30.5, "max": 31.25 },
        "shade_threshold": 32.25,
        "skipped_routes": [{ "route_id": 1, "reason": "malformed polyline" }]
    }"#;

    fn response() -> ApiResponse {
        serde_json::from_str(RESPONSE).unwrap()
    }

    #[test]
    fn response_becomes_batch_stats() {
        let stats = response().batch_stats();
        assert_eq!(stats.routes.len(), 2);
        let warm = stats.route(0).unwrap();
        assert_eq!(warm.point_count, 3);
        assert_eq!(warm.mean, Some(31.25));
        assert_eq!(warm.normalized_score, Some(100.0));
        assert_eq!(warm.rank, 1);
        let cool = stats.route(2).unwrap();
        assert_eq!(cool.shade_percentage, 100.0);
        assert_eq!(cool.rank, 0);
        assert_eq!(stats.shade_threshold, Some(32.25));
        assert_eq!(stats.mean_range, Some(ValueRange { min: 30.5, max: 31.25 }));
        assert!(stats.route(1).is_none());
    }

    #[test]
    fn skipped_server_route_fails_comparison() {
        let mut local = response().batch_stats();
        local.routes.push(RouteStats {
            route_id: 1,
            point_count: 2,
            mean: Some(31.0),
            min: Some(31.0),
            max: Some(31.0),
            normalized_score: Some(50.0),
            shade_percentage: 100.0,
            rank: 1,
        });
        let comparison = compare_batches(&local, &response().batch_stats(), &Tolerance::default());
        assert!(!comparison.passed);
        let missing = comparison.routes.iter().find(|r| r.route_id == 1).unwrap();
        assert_eq!(missing.candidate_rank, None);
    }

    #[test]
    fn api_mode_takes_exactly_one_leg() {
        let leg: Leg = "Texas Capitol, Austin|UT Tower, Austin".parse().unwrap();
        let input = RouteInput {
            legs: vec![leg.clone()],
            ..RouteInput::default()
        };
        assert_eq!(single_leg(&input).unwrap(), &leg);

        let two = RouteInput {
            legs: vec![leg.clone(), leg.clone()],
            ..RouteInput::default()
        };
        assert!(single_leg(&two).is_err());
        let mixed = RouteInput {
            polylines: vec!["_p~iF~ps|U".to_string()],
            legs: vec![leg],
            ..RouteInput::default()
        };
        assert!(single_leg(&mixed).is_err());
        assert!(single_leg(&RouteInput::default()).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let err = process_route("http://127.0.0.1:9/", "a", "b").await.unwrap_err();
        assert!(err.to_string().contains("http://127.0.0.1:9/api/process-route"), "{err:#}");
    }
}
