//! The HTTP capability the executor talks through.
//!
//! Only GET is needed. Implementations report the status and body of every completed
//! exchange, including error statuses; a [`TransportError`] means no response arrived at all.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

use crate::error::{QueryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

pub trait HttpTransport: Send + Sync {
    fn get(
        &self,
        url: &str,
        params: &[(String, String)],
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError>;
}

/// Blocking reqwest client. Query parameters are percent-encoded by reqwest.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QueryError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish()
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        params: &[(String, String)],
        timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .header("Accept", "application/json")
            .timeout(timeout)
            .send()
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(classify)?;
        Ok(HttpResponse { status, body })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// The full GET URL for `params`, encoded the way the transport will send it.
pub fn full_url(base: &str, params: &[(String, String)]) -> Result<String> {
    let parsed = if params.is_empty() {
        reqwest::Url::parse(base)
    } else {
        reqwest::Url::parse_with_params(base, params)
    };
    parsed
        .map(String::from)
        .map_err(|e| QueryError::Config(format!("invalid catalog url '{base}': {e}")))
}
