//! Collection URL discovery from a body object.
//!
//! A council API publishes one body object per municipality. It links to
//! the paper and meeting collections, so a harvest can be configured with
//! only the body URL.

use council_archive_records_models::{Body, RecordKind};

use crate::fetch::fetch_json;
use crate::{HttpClient, ScrapeError};

/// Seed URLs of the two collections a harvest crawls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Paper collection.
    pub papers: String,
    /// Meeting collection.
    pub meetings: String,
}

impl Endpoints {
    /// Seed URL for the collection of `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Paper => &self.papers,
            RecordKind::Meeting => &self.meetings,
        }
    }
}

/// Fetches the body object at `body_url` and returns its collection URLs.
///
/// # Errors
///
/// Returns [`ScrapeError`] if the request fails, or
/// [`ScrapeError::Decode`] if the body lacks either collection link.
pub async fn discover_endpoints<C>(client: &C, body_url: &str) -> Result<Endpoints, ScrapeError>
where
    C: HttpClient + ?Sized,
{
    let body: Body = fetch_json(client, body_url).await?;

    let missing = |field: &str| ScrapeError::Decode {
        url: body_url.to_owned(),
        message: format!("body object has no '{field}' collection link"),
    };

    let endpoints = Endpoints {
        papers: body.paper.ok_or_else(|| missing("paper"))?,
        meetings: body.meeting.ok_or_else(|| missing("meeting"))?,
    };

    log::info!(
        "Discovered collections for {}: papers={}, meetings={}",
        body.name.as_deref().unwrap_or(&body.id),
        endpoints.papers,
        endpoints.meetings,
    );

    Ok(endpoints)
}
