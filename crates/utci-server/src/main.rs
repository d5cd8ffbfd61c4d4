//! UTCI Server - scores walking routes by thermal comfort

use anyhow::Result;
use axum::http::{HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use utci_server::{api, config::Config, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    tracing::info!("Starting UTCI route server...");

    let config = Config::from_env();
    if config.google_maps_api_key.trim().is_empty() {
        tracing::warn!("GOOGLE_MAPS_API_KEY is not set; geocoding and directions will fail");
    }
    let port = config.server_port;
    let cors = cors_layer(&config.allowed_origins);
    let state = Arc::new(AppState::new(config)?);

    // Warm the raster cache so the first request does not pay for the load.
    if let Err(err) = utci_server::pipeline::load_raster(&state).await {
        tracing::warn!(error = %err, "Raster not loaded at startup; will retry per request");
    }

    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("utci_server=info".parse()?);
    let json = std::env::var("UTCI_LOG_JSON")
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}
