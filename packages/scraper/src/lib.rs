#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fetching and crawling of paginated council record collections.
//!
//! Provides the [`HttpClient`] seam (with a [`ReqwestClient`]
//! implementation), single-page decoding in [`fetch`], whole-collection
//! crawling in [`crawl`], and collection URL discovery from a body object
//! in [`body`].
//!
//! This crate has no knowledge of the local archive. It returns typed
//! records and leaves persistence to callers.

pub mod body;
pub mod crawl;
pub mod fetch;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use std::time::Duration;

/// Errors that can occur while talking to the remote API.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// The remote host could not be reached or the connection broke.
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying network error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} {reason} for {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Numeric status code.
        status: u16,
        /// Canonical reason phrase (may be empty).
        reason: String,
    },

    /// The body is not JSON or does not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// What did not match.
        message: String,
    },

    /// A URL could not be parsed or built.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },

    /// The HTTP client itself could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

impl ScrapeError {
    /// Wraps a network-level failure for `url`.
    pub fn transport(
        url: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            url: url.to_owned(),
            source: source.into(),
        }
    }

    /// The HTTP status code, if this error is a non-2xx response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Minimal HTTP surface the harvester needs: a GET returning the body.
///
/// Implementations must map non-2xx responses to
/// [`ScrapeError::HttpStatus`] and network failures to
/// [`ScrapeError::Transport`].
pub trait HttpClient: Send + Sync {
    /// Fetches `url` and returns the full response body.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] on network failure or a non-2xx status.
    fn get_bytes(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, ScrapeError>> + Send;
}

/// [`HttpClient`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client sending `user_agent` on every request.
    ///
    /// `timeout` applies to whole requests. `None` means requests may take
    /// as long as the server needs.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Client`] if the TLS backend cannot be
    /// initialized.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, ScrapeError> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl HttpClient for ReqwestClient {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        log::trace!("GET {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_owned(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ScrapeError::transport(url, e))?;

        Ok(body.to_vec())
    }
}
