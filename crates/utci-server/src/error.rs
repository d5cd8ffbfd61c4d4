//! Request-level failures and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Origin and destination are required")]
    Input,
    #[error("Failed to find coordinates for locations")]
    Geocoding { address: String },
    #[error("No routes found between the specified locations")]
    NoRoute,
    #[error("UTCI raster data is unavailable")]
    DataUnavailable { location: String, reason: String },
    #[error("Error processing route")]
    Internal(String),
}

impl ProcessError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProcessError::Input | ProcessError::Geocoding { .. } | ProcessError::NoRoute => {
                StatusCode::BAD_REQUEST
            }
            ProcessError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ProcessError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ProcessError::Input | ProcessError::NoRoute => None,
            ProcessError::Geocoding { address } => Some(format!("could not resolve `{address}`")),
            ProcessError::DataUnavailable { location, reason } => Some(format!(
                "{reason} (source: {location}). Place the raster at UTCI_RASTER_PATH, set \
                 UTCI_RASTER_URL to download it, or build a quantized copy with utci-convert \
                 and set UTCI_RASTER_FORMAT=npz."
            )),
            ProcessError::Internal(details) => Some(details.clone()),
        }
    }
}

impl IntoResponse for ProcessError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, details = ?self.details(), "Route request failed");
        } else {
            tracing::info!(error = %self, details = ?self.details(), "Route request rejected");
        }
        let body = match self.details() {
            Some(details) => json!({ "error": self.to_string(), "details": details }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
