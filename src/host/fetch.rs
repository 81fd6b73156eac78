//! Blocking HTTP downloads with a bounded timeout.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{OperatorError, OperatorResult};

/// Downloads release archives over HTTPS.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> OperatorResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OperatorError::Download {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    /// Download `url` into `dest`, replacing any existing file.
    pub fn fetch(&self, url: &str, dest: &Path) -> OperatorResult<()> {
        debug!(url = %url, dest = %dest.display(), "Downloading");

        let mut response = self.client.get(url).send().map_err(|e| self.download_error(url, e))?;

        if !response.status().is_success() {
            return Err(OperatorError::Download {
                message: format!("HTTP {} for {}", response.status(), url),
            });
        }

        let mut file = File::create(dest).map_err(|e| OperatorError::Download {
            message: format!("Failed to create '{}': {}", dest.display(), e),
        })?;

        let bytes = response
            .copy_to(&mut file)
            .map_err(|e| self.download_error(url, e))?;

        info!(url = %url, bytes = bytes, "Download complete");
        Ok(())
    }

    fn download_error(&self, url: &str, e: reqwest::Error) -> OperatorError {
        let message = if e.is_timeout() {
            format!(
                "Timed out after {}s downloading {}",
                self.timeout.as_secs(),
                url
            )
        } else {
            format!("Failed to download {}: {}", url, e)
        };
        OperatorError::Download { message }
    }
}
