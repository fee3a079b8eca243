//! Blocking HTTP client with an optional politeness delay between requests. No retries.

use crate::scraper::error::FetchError;
use crate::scraper::{FetchedResource, Fetcher};
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; coursebook/0.1; +https://github.com/coursebook)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_SECS: u64 = 0;
const MAX_REDIRECTS: usize = 10;

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl PoliteClient {
    /// Build a client with default User-Agent, timeout, and no delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    /// Perform a GET request and fail on any non-success status.
    fn get(&mut self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        self.wait_delay();
        let result = self.inner.get(url).send();
        self.last_request = Some(Instant::now());
        let response = result.map_err(|e| FetchError::Network {
            url: url.to_string(),
            source: e,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

impl Fetcher for PoliteClient {
    fn fetch(&mut self, url: &str) -> Result<FetchedResource, FetchError> {
        let response = self.get(url)?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response.bytes().map_err(|e| FetchError::BodyRead {
            url: url.to_string(),
            source: e,
        })?;
        Ok(FetchedResource {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    /// Decodes the body using the charset from the response headers (UTF-8 otherwise).
    fn fetch_text(&mut self, url: &str) -> Result<String, FetchError> {
        self.get(url)?.text().map_err(|e| FetchError::BodyRead {
            url: url.to_string(),
            source: e,
        })
    }
}

/// Builder for PoliteClient with optional User-Agent, delay, and timeout.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent. If not set, a crawler-style default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 0.
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(PoliteClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_delay_setting() -> Result<(), reqwest::Error> {
        let client = PoliteClient::builder().delay_secs(3).timeout_secs(5).build()?;
        assert_eq!(client.delay, Duration::from_secs(3));
        assert!(client.last_request.is_none());
        Ok(())
    }

    #[test]
    fn unreachable_host_is_a_network_error() -> Result<(), reqwest::Error> {
        let mut client = PoliteClient::builder().timeout_secs(2).build()?;
        match client.fetch("http://127.0.0.1:9/never") {
            Err(FetchError::Network { url, .. }) => assert_eq!(url, "http://127.0.0.1:9/never"),
            other => panic!("expected network error, got {:?}", other.map(|r| r.bytes.len())),
        }
        Ok(())
    }
}
