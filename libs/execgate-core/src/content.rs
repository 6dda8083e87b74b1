//! Resolution of test-case file references.
//!
//! The gateway does not own test-case content; an external content store
//! supplies it. File references are opaque fetchable locations.

use crate::error::GatewayError;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait TestCaseFetcher: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<String, GatewayError>;
}

/// Fetches test-case files over HTTP. Relative references are resolved
/// against the configured content base URL.
pub struct HttpTestCaseFetcher {
    http: reqwest::Client,
    base_url: Option<String>,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

impl HttpTestCaseFetcher {
    pub fn new(base_url: Option<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(HttpTestCaseFetcher {
            http,
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
        })
    }

    fn resolve(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return reference.to_string();
        }
        match &self.base_url {
            Some(base) => format!("{}/{}", base, reference.trim_start_matches('/')),
            None => reference.to_string(),
        }
    }
}

#[async_trait]
impl TestCaseFetcher for HttpTestCaseFetcher {
    async fn fetch(&self, reference: &str) -> Result<String, GatewayError> {
        let url = self.resolve(reference);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|_| GatewayError::ContentFetch(reference.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::ContentFetch(reference.to_string()));
        }

        response
            .text()
            .await
            .map_err(|_| GatewayError::ContentFetch(reference.to_string()))
    }
}
