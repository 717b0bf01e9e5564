//! Downloading group pictures from a URL

use crate::error::{BridgeError, Result};
use reqwest::Client;
use tracing::{debug, warn};

/// Largest picture accepted
pub const MAX_PICTURE_BYTES: usize = 10 * 1024 * 1024;

/// HTTP client for fetching pictures referenced by URL (for example a file
/// link handed over by the chat bot)
pub struct PictureFetcher {
    client: Client,
}

impl PictureFetcher {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch the picture at `url`
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| BridgeError::BadRequest(format!("Invalid file URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BridgeError::BadRequest(format!(
                "Unsupported file URL scheme: {}",
                parsed.scheme()
            )));
        }

        debug!(url = %redact(&parsed), "Fetching group picture");

        let mut response = self.client.get(parsed.clone()).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %redact(&parsed), "Failed to fetch picture");
            return Err(BridgeError::BadRequest(format!(
                "File URL returned status {}",
                response.status()
            )));
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_PICTURE_BYTES as u64)
        {
            return Err(too_large());
        }

        // The declared length may be absent or wrong; cap what is actually read
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if data.len() + chunk.len() > MAX_PICTURE_BYTES {
                return Err(too_large());
            }
            data.extend_from_slice(&chunk);
        }

        debug!(size = data.len(), "Fetched group picture");
        Ok(data)
    }
}

fn too_large() -> BridgeError {
    BridgeError::BadRequest(format!("Picture is larger than {} bytes", MAX_PICTURE_BYTES))
}

impl Default for PictureFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Bot file links embed the bot token in the path; only log the host.
fn redact(url: &reqwest::Url) -> String {
    format!("{}://{}/...", url.scheme(), url.host_str().unwrap_or(""))
}
