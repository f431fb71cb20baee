//! HTTP client abstraction for the dashboard relay.
//!
//! The dashboard manager only ever POSTs JSON, so the trait is deliberately
//! narrow. The trait exists so retry/backoff behavior can be tested against a
//! mock without real network requests; the default implementation wraps a
//! single shared `reqwest::Client`.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::Error;

/// Status code plus body of a completed request. The relay treats any
/// non-2xx status as a failure; the body is only used for log context.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A generic trait for POSTing JSON payloads.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn post_json(
        &self,
        url: String,
        body: Value,
        timeout: Duration,
    ) -> Result<HttpResponse, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DefaultHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn post_json(
        &self,
        url: String,
        body: Value,
        timeout: Duration,
    ) -> Result<HttpResponse, Error> {
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}
