//! Raster acquisition: a local file, or a URL fetched once into a cache dir.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("raster file not found at {0}")]
    NotFound(PathBuf),
    #[error("raster download failed: {0}")]
    Download(String),
    #[error("raster cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RasterSource {
    Path(PathBuf),
    Url {
        url: String,
        cache_dir: PathBuf,
        timeout: Duration,
    },
}

impl RasterSource {
    /// The URL wins when both a path and a URL are configured.
    pub fn from_config(config: &Config) -> Self {
        match &config.raster_url {
            Some(url) => RasterSource::Url {
                url: url.clone(),
                cache_dir: config.raster_cache_dir.clone(),
                timeout: config.raster_download_timeout(),
            },
            None => RasterSource::Path(config.raster_path.clone()),
        }
    }

    /// Key under which the loaded raster is cached in memory.
    pub fn cache_key(&self) -> String {
        match self {
            RasterSource::Path(path) => path.display().to_string(),
            RasterSource::Url { url, .. } => url.clone(),
        }
    }

    /// Local path of the raster, downloading it first if needed.
    pub async fn resolve(&self, client: &Client) -> Result<PathBuf, SourceError> {
        match self {
            RasterSource::Path(path) => {
                if tokio::fs::try_exists(path).await? {
                    Ok(path.clone())
                } else {
                    Err(SourceError::NotFound(path.clone()))
                }
            }
            RasterSource::Url {
                url,
                cache_dir,
                timeout,
            } => {
                let target = cache_dir.join(cache_file_name(url));
                if tokio::fs::try_exists(&target).await? {
                    tracing::debug!(path = %target.display(), "Using cached raster download");
                    return Ok(target);
                }
                download(client, url, &target, *timeout).await?;
                Ok(target)
            }
        }
    }
}

/// Stream `url` into `target` through a uniquely named `.part` file. The
/// per-request `timeout` replaces the client's own.
async fn download(
    client: &Client,
    url: &str,
    target: &Path,
    timeout: Duration,
) -> Result<(), SourceError> {
    tracing::info!(
        url,
        path = %target.display(),
        timeout_s = timeout.as_secs(),
        "Downloading raster"
    );
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| SourceError::Download(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Download(format!("{url} returned HTTP {status}")));
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = target.with_extension(format!("{}.part", uuid::Uuid::new_v4().simple()));
    let written = match write_body(response, &partial).await {
        Ok(written) => written,
        Err(err) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(err);
        }
    };
    if let Err(err) = tokio::fs::rename(&partial, target).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(err.into());
    }
    tracing::info!(bytes = written, "Raster download complete");
    Ok(())
}

async fn write_body(response: Response, path: &Path) -> Result<u64, SourceError> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| SourceError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// File name for a downloaded URL: its last path segment when that looks
/// like a file name, else a fixed fallback.
fn cache_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && s.contains('.'))
        .map(|s| {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || "._-".contains(c) { c } else { '_' })
                .collect()
        })
        .unwrap_or_else(|| "utci-raster.bin".to_string())
}
