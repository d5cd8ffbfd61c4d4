//! UTCI providers - geocoding and directions collaborators
//!
//! The route scorer only needs two things from the outside world: turning
//! an address into a coordinate, and a set of alternative walking routes
//! between two coordinates. Both sit behind object-safe traits so the
//! server can swap in fakes.

pub mod google;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utci_core::GeoPoint;

pub use google::{GoogleMapsClient, GoogleMapsConfig};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no match for `{0}`")]
    NotFound(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected provider response: {0}")]
    Parse(String),
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// One alternative returned by a directions provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsRoute {
    /// Route geometry as an encoded polyline.
    pub encoded_path: String,
    /// Human-readable duration of the first leg, e.g. "12 mins".
    pub duration_text: String,
    /// Human-readable distance of the first leg, e.g. "0.9 km".
    pub distance_text: String,
}

pub trait Geocoder: Send + Sync {
    /// Resolve a free-text address. Unresolvable addresses yield
    /// [`ProviderError::NotFound`].
    fn geocode<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<GeoPoint, ProviderError>>;
}

pub trait DirectionsProvider: Send + Sync {
    /// Alternative walking routes, possibly none.
    fn directions<'a>(
        &'a self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> BoxFuture<'a, Result<Vec<DirectionsRoute>, ProviderError>>;
}
