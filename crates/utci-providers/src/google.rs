//! Google Maps Geocoding and Directions clients.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::Deserialize;
use utci_core::GeoPoint;

use crate::{DirectionsProvider, DirectionsRoute, Geocoder, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Clone)]
pub struct GoogleMapsConfig {
    pub api_key: String,
    /// Base URL without a trailing slash, e.g. `https://maps.googleapis.com/maps/api`.
    pub base_url: String,
    pub travel_mode: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for GoogleMapsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            travel_mode: "walking".to_string(),
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP client for the Google Maps web services.
#[derive(Debug, Clone)]
pub struct GoogleMapsClient {
    client: Client,
    config: GoogleMapsConfig,
}

impl GoogleMapsClient {
    /// Build a client with its own connection pool and the configured timeouts.
    pub fn new(config: GoogleMapsConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing `reqwest::Client`.
    pub fn with_client(client: Client, mut config: GoogleMapsConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self { client, config }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}/json", self.config.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn geocode_address(&self, address: &str) -> Result<GeoPoint, ProviderError> {
        let payload: GeocodeResponse = self.get_json("geocode", &[("address", address)]).await?;
        parse_geocode(payload, address)
    }

    pub async fn walking_directions(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<Vec<DirectionsRoute>, ProviderError> {
        let origin = format_latlng(origin);
        let destination = format_latlng(destination);
        let payload: DirectionsResponse = self
            .get_json(
                "directions",
                &[
                    ("origin", origin.as_str()),
                    ("destination", destination.as_str()),
                    ("mode", self.config.travel_mode.as_str()),
                    ("alternatives", "true"),
                ],
            )
            .await?;
        Ok(parse_directions(payload))
    }
}

impl Geocoder for GoogleMapsClient {
    fn geocode<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<GeoPoint, ProviderError>> {
        self.geocode_address(address).boxed()
    }
}

impl DirectionsProvider for GoogleMapsClient {
    fn directions<'a>(
        &'a self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> BoxFuture<'a, Result<Vec<DirectionsRoute>, ProviderError>> {
        self.walking_directions(origin, destination).boxed()
    }
}

fn format_latlng(point: GeoPoint) -> String {
    format!("{},{}", point.lat, point.lon)
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    overview_polyline: Polyline,
    #[serde(default)]
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Polyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct Leg {
    duration: Option<TextValue>,
    distance: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: String,
}

/// Any status other than `OK` means the address did not resolve.
fn parse_geocode(payload: GeocodeResponse, address: &str) -> Result<GeoPoint, ProviderError> {
    if payload.status != "OK" {
        tracing::debug!(status = %payload.status, address, "Geocoding returned no match");
        return Err(ProviderError::NotFound(address.to_string()));
    }
    let location = payload
        .results
        .into_iter()
        .next()
        .map(|r| r.geometry.location)
        .ok_or_else(|| ProviderError::NotFound(address.to_string()))?;
    Ok(GeoPoint::new(location.lat, location.lng))
}

/// Non-`OK` statuses yield no routes.
fn parse_directions(payload: DirectionsResponse) -> Vec<DirectionsRoute> {
    if payload.status != "OK" {
        tracing::warn!(status = %payload.status, "Directions request returned no routes");
        return Vec::new();
    }
    payload
        .routes
        .into_iter()
        .map(|route| {
            let leg = route.legs.into_iter().next();
            let (duration_text, distance_text) = match leg {
                Some(leg) => (
                    leg.duration.map(|t| t.text).unwrap_or_default(),
                    leg.distance.map(|t| t.text).unwrap_or_default(),
                ),
                None => (String::new(), String::new()),
            };
            DirectionsRoute {
                encoded_path: route.overview_polyline.points,
                duration_text,
                distance_text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOCODE_OK: &str = r#"{
        "results": [
            {
                "formatted_address": "110 Inner Campus Drive, Austin, TX 78712, USA",
                "geometry": {
                    "location": { "lat": 30.2861062, "lng": -97.7393634 },
                    "location_type": "ROOFTOP"
                }
            }
        ],
        "status": "OK"
    }"#;

    const DIRECTIONS_OK: &str = r#"{
        "geocoded_waypoints": [],
        "routes": [
            {
                "summary": "Speedway",
                "overview_polyline": { "points": "_p~iF~ps|U_ulLnnqC" },
                "legs": [
                    {
                        "distance": { "text": "1.4 km", "value": 1412 },
                        "duration": { "text": "18 mins", "value": 1080 }
                    }
                ]
            },
            {
                "summary": "Guadalupe St",
                "overview_polyline": { "points": "_mqNvxq`@" },
                "legs": []
            }
        ],
        "status": "OK"
    }"#;

    #[test]
    fn parses_geocode_location() {
        let payload: GeocodeResponse = serde_json::from_str(GEOCODE_OK).unwrap();
        let point = parse_geocode(payload, "UT Tower").unwrap();
        assert_eq!(point, GeoPoint::new(30.2861062, -97.7393634));
    }

    #[test]
    fn zero_results_is_not_found() {
        let payload: GeocodeResponse =
            serde_json::from_str(r#"{"results": [], "status": "ZERO_RESULTS"}"#).unwrap();
        let err = parse_geocode(payload, "nowhere").unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(ref a) if a == "nowhere"));
    }

    #[test]
    fn parses_alternative_routes() {
        let payload: DirectionsResponse = serde_json::from_str(DIRECTIONS_OK).unwrap();
        let routes = parse_directions(payload);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].encoded_path, "_p~iF~ps|U_ulLnnqC");
        assert_eq!(routes[0].duration_text, "18 mins");
        assert_eq!(routes[0].distance_text, "1.4 km");
        assert_eq!(routes[1].duration_text, "");
    }

    #[test]
    fn denied_directions_yield_no_routes() {
        let payload: DirectionsResponse = serde_json::from_str(
            r#"{"routes": [], "status": "REQUEST_DENIED", "error_message": "bad key"}"#,
        )
        .unwrap();
        assert!(parse_directions(payload).is_empty());
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let client = GoogleMapsClient::with_client(
            Client::new(),
            GoogleMapsConfig {
                base_url: "http://localhost:9/maps/api/".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(client.config.base_url, "http://localhost:9/maps/api");
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let client = GoogleMapsClient::new(GoogleMapsConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        })
        .unwrap();
        let err = client.geocode("UT Tower").await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)), "{err:?}");
    }
}
