//! HTTP fetcher with streaming download and transfer progress.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{FetchError, Fetched, Fetcher};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Fetcher backed by reqwest. Streams the body to disk in chunks, feeding a
/// progress bar and a SHA-256 digest as bytes arrive.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rigup/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<Fetched, FetchError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let bar = transfer_bar(response.content_length());

        let mut response = response;
        let mut file = fs::File::create(dest).await?;
        let mut hasher = Sha256::new();
        let mut bytes: u64 = 0;

        loop {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            let Some(chunk) = chunk else { break };

            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
            bar.set_position(bytes);
        }

        file.flush().await?;
        bar.finish_and_clear();

        Ok(Fetched {
            path: dest.to_path_buf(),
            bytes,
            digest: hex::encode(hasher.finalize()),
        })
    }

    async fn probe(&self, url: &str) -> Result<(), FetchError> {
        self.client
            .head(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(())
    }
}

fn transfer_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .expect("valid progress template")
                .progress_chars("=>-"),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner} {bytes} ({bytes_per_sec})")
                    .expect("valid progress template"),
            );
            bar
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_and_unbounded_bars() {
        let bounded = transfer_bar(Some(1024));
        assert_eq!(bounded.length(), Some(1024));

        let unbounded = transfer_bar(None);
        assert_eq!(unbounded.length(), None);
    }
}
