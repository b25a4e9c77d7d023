//! HTTP fetcher
//!
//! The engine talks to the network only through the [`Fetcher`] trait.
//! [`HttpFetcher`] is the reqwest-backed implementation; tests substitute
//! their own.
//!
//! # Error classification
//!
//! | Failure | Class |
//! |---------|-------|
//! | Timeout | transient |
//! | Connection refused / DNS | transient |
//! | Connection reset | blocked signal |
//! | TLS handshake / certificate | blocked signal |
//! | Redirect loop or chain too long | permanent |
//! | Malformed URL | permanent |

use crate::config::FetchConfig;
use crate::state::StatusClass;
use crate::url::parse_http_url;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::collections::HashMap;
use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;

/// A response that made it back from the server, whatever its status
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: String,

    pub status: u16,

    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,

    pub body: String,
}

/// Transport-level failure; no HTTP status was received
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("redirect error: {0}")]
    Redirect(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl FetchError {
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::Timeout | Self::Connect(_) | Self::Other(_) => StatusClass::TransientError,
            Self::ConnectionReset(_) | Self::Tls(_) => StatusClass::BlockedSignal,
            Self::Redirect(_) | Self::InvalidUrl(_) => StatusClass::PermanentError,
        }
    }
}

/// Network transport consumed by workers
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`; any HTTP status is a successful fetch at this level
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

/// Builds the shared HTTP client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs_f64(config.timeout))
        .connect_timeout(Duration::from_secs_f64(config.connect_timeout))
        .redirect(Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(config.insecure)
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let target = parse_http_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(classify_error)?;

        Ok(FetchedPage {
            final_url,
            status,
            headers,
            body,
        })
    }
}

/// Maps a reqwest error onto the fetch taxonomy
fn classify_error(error: reqwest::Error) -> FetchError {
    let chain = error_chain(&error);
    let lowered = chain.to_ascii_lowercase();

    if error.is_builder() || lowered.contains("relative url") || lowered.contains("invalid url") {
        return FetchError::InvalidUrl(chain);
    }
    if error.is_redirect() {
        return FetchError::Redirect(chain);
    }
    if error.is_timeout() {
        return FetchError::Timeout;
    }
    if lowered.contains("connection reset") || lowered.contains("reset by peer") {
        return FetchError::ConnectionReset(chain);
    }
    if lowered.contains("tls") || lowered.contains("certificate") || lowered.contains("handshake")
    {
        return FetchError::Tls(chain);
    }
    if error.is_connect() {
        return FetchError::Connect(chain);
    }
    FetchError::Other(chain)
}

/// Joins an error and its sources into one line
fn error_chain(error: &reqwest::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
