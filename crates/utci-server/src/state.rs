//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;
use utci_core::RasterField;
use utci_providers::{DirectionsProvider, Geocoder, GoogleMapsClient, GoogleMapsConfig};

use crate::cache::RasterCache;
use crate::config::Config;
use crate::raster_source::RasterSource;

/// Everything a request needs, passed to handlers behind an `Arc`.
pub struct AppState {
    config: Config,
    http: Client,
    geocoder: Arc<dyn Geocoder>,
    directions: Arc<dyn DirectionsProvider>,
    rasters: RasterCache,
    started_at: Instant,
}

impl AppState {
    /// State backed by the Google Maps providers.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .connect_timeout(config.http_connect_timeout())
            .build()?;
        let google = Arc::new(GoogleMapsClient::with_client(
            http.clone(),
            GoogleMapsConfig {
                api_key: config.google_maps_api_key.clone(),
                base_url: config.maps_base_url.clone(),
                travel_mode: config.travel_mode.clone(),
                timeout: config.http_timeout(),
                connect_timeout: config.http_connect_timeout(),
            },
        ));
        Ok(Self::with_providers(config, http, google.clone(), google))
    }

    pub fn with_providers(
        config: Config,
        http: Client,
        geocoder: Arc<dyn Geocoder>,
        directions: Arc<dyn DirectionsProvider>,
    ) -> Self {
        let rasters = RasterCache::new(config.raster_cache_max_entries, config.raster_cache_ttl());
        Self {
            config,
            http,
            geocoder,
            directions,
            rasters,
            started_at: Instant::now(),
        }
    }

    /// Pre-load a raster for the configured source, e.g. for tests or warm starts.
    pub fn with_raster(self, field: Arc<dyn RasterField>) -> Self {
        let key = RasterSource::from_config(&self.config).cache_key();
        self.rasters.insert(key, field);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn geocoder(&self) -> &dyn Geocoder {
        self.geocoder.as_ref()
    }

    pub fn directions(&self) -> &dyn DirectionsProvider {
        self.directions.as_ref()
    }

    pub fn rasters(&self) -> &RasterCache {
        &self.rasters
    }

    pub fn uptime_s(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
