//! Network access for repository metadata and package artifacts.

use log::debug;
use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Trait for HTTP operations - allows mocking in tests
pub trait Fetcher: Send + Sync {
    /// Fetch a document into memory.
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Stream a document to `dest`, returning the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let data = self.get(url)?;
        fs::write(dest, &data)?;
        Ok(data.len() as u64)
    }
}

/// The default `Fetcher`, backed by a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("os-image-composer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network {
                url: url.to_string(),
                message: format!("unexpected HTTP status {}", status),
            });
        }
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url)?;
        Ok(response.bytes()?.to_vec())
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.send(url)?;
        let mut file = File::create(dest)?;
        let written = response.copy_to(&mut file).map_err(|e| Error::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(written)
    }
}
