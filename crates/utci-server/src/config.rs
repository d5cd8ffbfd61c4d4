//! Server configuration from environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use utci_core::RasterFormat;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub google_maps_api_key: String,
    pub maps_base_url: String,
    pub travel_mode: String,
    pub raster_path: PathBuf,
    pub raster_url: Option<String>,
    pub raster_format: RasterFormat,
    pub raster_epsg: u32,
    pub raster_cache_dir: PathBuf,
    pub raster_cache_ttl_s: u64,
    pub raster_cache_max_entries: usize,
    pub raster_download_timeout_s: u64,
    pub output_dir: PathBuf,
    pub export_enabled: bool,
    pub spacing_m: f64,
    pub shade_percentile: f64,
    pub http_timeout_s: u64,
    pub http_connect_timeout_s: u64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("UTCI_PORT")
                .or_else(|_| env::var("PORT"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5001),
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY").unwrap_or_default(),
            maps_base_url: env::var("UTCI_MAPS_BASE_URL")
                .unwrap_or_else(|_| utci_providers::google::DEFAULT_BASE_URL.to_string()),
            travel_mode: env::var("UTCI_TRAVEL_MODE").unwrap_or_else(|_| "walking".to_string()),
            raster_path: env::var("UTCI_RASTER_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("UTCI_1600.tif")),
            raster_url: env::var("UTCI_RASTER_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            raster_format: env::var("UTCI_RASTER_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(RasterFormat::GeoTiff),
            raster_epsg: env::var("UTCI_RASTER_EPSG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6343),
            raster_cache_dir: env::var("UTCI_RASTER_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("utci-raster")),
            raster_cache_ttl_s: env::var("UTCI_RASTER_CACHE_TTL_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            raster_cache_max_entries: env::var("UTCI_RASTER_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            raster_download_timeout_s: env::var("UTCI_RASTER_DOWNLOAD_TIMEOUT_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
            output_dir: env::var("UTCI_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            export_enabled: env::var("UTCI_EXPORT_ENABLED")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(true),
            spacing_m: env::var("UTCI_SPACING_M")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| v.is_finite() && *v >= utci_core::MIN_SPACING_M)
                .unwrap_or(utci_core::DEFAULT_SPACING_M),
            shade_percentile: env::var("UTCI_SHADE_PERCENTILE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v: &f64| (0.0..=100.0).contains(v))
                .unwrap_or(utci_core::DEFAULT_SHADE_PERCENTILE),
            http_timeout_s: env::var("UTCI_HTTP_TIMEOUT_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15),
            http_connect_timeout_s: env::var("UTCI_HTTP_CONNECT_TIMEOUT_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:3001".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_s.max(1))
    }

    pub fn http_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout_s.max(1))
    }

    pub fn raster_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.raster_cache_ttl_s)
    }

    /// Whole-transfer limit for the raster download, separate from the
    /// provider timeout.
    pub fn raster_download_timeout(&self) -> Duration {
        Duration::from_secs(self.raster_download_timeout_s.max(1))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_bool;

    #[test]
    fn parses_flag_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
