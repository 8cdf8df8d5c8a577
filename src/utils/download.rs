use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, info};

/// Source of remote documents (installer scripts, manifests)
pub trait ManifestSource {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain HTTPS GET with a blocking reqwest client
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("uiforge-cluster/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl ManifestSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "downloading");
        self.client
            .get(url)
            .send()
            .with_context(|| format!("Failed to download {}", url))?
            .error_for_status()
            .with_context(|| format!("HTTP error downloading {}", url))?
            .text()
            .with_context(|| format!("Failed to read content of {}", url))
    }
}

/// Lowercase hex SHA-256 of `content`
pub fn sha256_hex(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Fetch `url` and, when a pin is configured, refuse content whose digest differs
pub fn fetch_verified(source: &dyn ManifestSource, url: &str, pin: Option<&str>) -> Result<String> {
    let content = source.fetch(url)?;

    match pin {
        Some(expected) => {
            let actual = sha256_hex(content.as_bytes());
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                bail!(
                    "Checksum mismatch for {}: expected sha256 {}, got {}",
                    url,
                    expected,
                    actual
                );
            }
            info!(url, "checksum verified");
        }
        None => debug!(url, sha256 = %sha256_hex(content.as_bytes()), "no checksum pinned"),
    }

    Ok(content)
}
