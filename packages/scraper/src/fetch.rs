//! Single-request decoding: one GET, one typed value.

use council_archive_records_models::CollectionPage;
use serde::de::DeserializeOwned;

use crate::{HttpClient, ScrapeError};

/// Maximum length of the body preview included in decode errors.
const BODY_PREVIEW_LEN: usize = 200;

/// Fetches `url` and decodes the body as JSON into `T`.
///
/// # Errors
///
/// Returns [`ScrapeError::Transport`] or [`ScrapeError::HttpStatus`] from
/// the client, or [`ScrapeError::Decode`] if the body does not decode.
pub async fn fetch_json<T, C>(client: &C, url: &str) -> Result<T, ScrapeError>
where
    T: DeserializeOwned,
    C: HttpClient + ?Sized,
{
    let body = client.get_bytes(url).await?;

    serde_json::from_slice(&body).map_err(|e| {
        let text = String::from_utf8_lossy(&body);
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::debug!("Decode failed for {url}: {e}\n  body preview: {preview}");
        ScrapeError::Decode {
            url: url.to_owned(),
            message: e.to_string(),
        }
    })
}

/// Fetches one page of a collection.
///
/// The `next` and `last` links are returned verbatim; resolving them is
/// the crawler's job.
///
/// # Errors
///
/// Returns [`ScrapeError`] if the request fails or the body is not a
/// `{ "data": [...], "links": {...} }` envelope of `T` records.
pub async fn fetch_page<T, C>(client: &C, url: &str) -> Result<CollectionPage<T>, ScrapeError>
where
    T: DeserializeOwned,
    C: HttpClient + ?Sized,
{
    let page: CollectionPage<T> = fetch_json(client, url).await?;

    log::debug!(
        "Fetched {url}: {} records, next={:?}, last={:?}",
        page.data.len(),
        page.next_link(),
        page.last_link(),
    );

    Ok(page)
}
