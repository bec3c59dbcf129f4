//! In-memory [`HttpClient`] for tests.
//!
//! Routes are keyed by the exact URL string. Unknown URLs answer 404.
//! Routes can be replaced between calls, which lets a test simulate a
//! remote whose behaviour changes from one harvest run to the next. The
//! client also tracks how many requests were in flight at once, so tests
//! can check that fan-out stays within its configured width.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{HttpClient, ScrapeError};

/// What a route answers with.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// 200 with the given body, optionally after a delay.
    Body {
        /// Response body.
        bytes: Vec<u8>,
        /// Artificial latency.
        delay: Option<Duration>,
    },
    /// A non-2xx status.
    Status(u16),
    /// A connection-level failure.
    TransportFailure,
}

/// In-memory [`HttpClient`] that records every request it sees.
#[derive(Debug, Default)]
pub struct MockClient {
    routes: Mutex<BTreeMap<String, MockResponse>>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Counts one request as in flight until dropped.
struct InFlight<'a> {
    client: &'a MockClient,
}

impl<'a> InFlight<'a> {
    fn enter(client: &'a MockClient) -> Self {
        let now = client.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        client.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { client }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.client.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockClient {
    /// Creates a client with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `url` with `value` encoded as JSON.
    #[must_use]
    pub fn with_json(self, url: &str, value: &serde_json::Value) -> Self {
        self.set(url, MockResponse::json(value));
        self
    }

    /// Answers `url` with raw bytes.
    #[must_use]
    pub fn with_bytes(self, url: &str, bytes: Vec<u8>) -> Self {
        self.set(url, MockResponse::Body { bytes, delay: None });
        self
    }

    /// Answers `url` with JSON after `delay`.
    #[must_use]
    pub fn with_delayed_json(self, url: &str, value: &serde_json::Value, delay: Duration) -> Self {
        self.set(
            url,
            MockResponse::Body {
                bytes: value.to_string().into_bytes(),
                delay: Some(delay),
            },
        );
        self
    }

    /// Answers `url` with raw bytes after `delay`.
    #[must_use]
    pub fn with_delayed_bytes(self, url: &str, bytes: Vec<u8>, delay: Duration) -> Self {
        self.set(
            url,
            MockResponse::Body {
                bytes,
                delay: Some(delay),
            },
        );
        self
    }

    /// Answers `url` with an HTTP status.
    #[must_use]
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.set(url, MockResponse::Status(status));
        self
    }

    /// Makes `url` fail at the connection level.
    #[must_use]
    pub fn with_transport_failure(self, url: &str) -> Self {
        self.set(url, MockResponse::TransportFailure);
        self
    }

    /// Replaces the route for `url`.
    pub fn set(&self, url: &str, response: MockResponse) {
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(url.to_owned(), response);
    }

    /// Every URL requested so far, in request order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// How many times `url` was requested.
    #[must_use]
    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|requested| *requested == url)
            .count()
    }

    /// Forgets all recorded requests and resets the in-flight peak.
    pub fn clear_requests(&self) {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.max_in_flight
            .store(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    /// Highest number of requests that were in flight at the same time.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl MockResponse {
    /// 200 with `value` encoded as JSON.
    #[must_use]
    pub fn json(value: &serde_json::Value) -> Self {
        Self::Body {
            bytes: value.to_string().into_bytes(),
            delay: None,
        }
    }
}

impl HttpClient for MockClient {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        let _in_flight = InFlight::enter(self);

        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(url.to_owned());

        let response = self
            .routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(url)
            .cloned();

        match response {
            Some(MockResponse::Body { bytes, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(bytes)
            }
            Some(MockResponse::Status(status)) => Err(ScrapeError::HttpStatus {
                url: url.to_owned(),
                status,
                reason: String::new(),
            }),
            Some(MockResponse::TransportFailure) => Err(ScrapeError::transport(
                url,
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            )),
            None => Err(ScrapeError::HttpStatus {
                url: url.to_owned(),
                status: 404,
                reason: "Not Found".to_owned(),
            }),
        }
    }
}
