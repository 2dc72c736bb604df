//! URL fetching for remote scripts.
//!
//! Downloads a script over HTTP(S) with a timeout and a size cap.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use super::LoaderError;

pub(crate) struct UrlFetcher {
    client: Client,
    max_size: u64,
}

impl UrlFetcher {
    pub(crate) fn new(timeout: Duration, max_size: u64) -> Result<Self, LoaderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quickjs-bind/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, max_size })
    }

    /// Fetch the body of `url`, rejecting non-success statuses and oversized bodies.
    pub(crate) fn fetch(&self, url: &Url) -> Result<Vec<u8>, LoaderError> {
        let response = self.client.get(url.clone()).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_size {
                return Err(LoaderError::ContentTooLarge {
                    size: len,
                    max: self.max_size,
                });
            }
        }

        // Read content with size limit
        let mut content = Vec::new();
        let mut reader = response.take(self.max_size + 1);
        reader.read_to_end(&mut content)?;

        if content.len() as u64 > self.max_size {
            return Err(LoaderError::ContentTooLarge {
                size: content.len() as u64,
                max: self.max_size,
            });
        }

        Ok(content)
    }
}
