//! Whole-collection crawling.
//!
//! The crawler fetches the first page, works out how many pages follow,
//! and then fetches the rest with bounded concurrency. Records come back
//! in page order no matter which request finishes first.
//!
//! How the page count is learned depends on the remote, so it is a
//! [`Pagination`] strategy rather than a fixed algorithm.

use std::collections::BTreeSet;

use council_archive_records_models::CollectionPage;
use futures::{StreamExt as _, TryStreamExt as _, stream};
use serde::de::DeserializeOwned;
use url::Url;

use crate::fetch::fetch_page;
use crate::{HttpClient, ScrapeError};

/// Default number of page requests in flight during one crawl.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 32;

/// How the pages of a collection are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    /// Pages are addressable by number through a query parameter. The
    /// page count is read from that parameter on the first page's `last`
    /// link, and pages `2..=count` are fetched concurrently.
    ///
    /// Falls back to following `next` links when `last` is missing or
    /// carries no page number.
    PageNumber {
        /// Query parameter holding the page number (e.g. `"page"`).
        param: String,
    },
    /// Pages are only reachable by following `next` links one by one.
    FollowNext,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::PageNumber {
            param: "page".to_owned(),
        }
    }
}

/// Settings for one collection crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Page addressing strategy.
    pub pagination: Pagination,
    /// Maximum number of page requests in flight.
    pub concurrency: usize,
    /// Stop after this many pages (the first page is always fetched).
    pub max_pages: Option<u32>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            pagination: Pagination::default(),
            concurrency: DEFAULT_PAGE_CONCURRENCY,
            max_pages: None,
        }
    }
}

impl CrawlOptions {
    /// Sets the pagination strategy.
    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Sets the number of concurrent page requests.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Caps the number of pages fetched.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn page_cap(&self) -> u32 {
        self.max_pages.unwrap_or(u32::MAX).max(1)
    }
}

/// Fetches every page of the collection at `seed_url` and returns all
/// records in page order.
///
/// The crawl is all or nothing: if any page fails, the whole crawl fails
/// and no records are returned.
///
/// # Errors
///
/// Returns the first [`ScrapeError`] raised by any page fetch, or
/// [`ScrapeError::InvalidUrl`] if page URLs cannot be built.
pub async fn crawl_collection<T, C>(
    client: &C,
    seed_url: &str,
    options: &CrawlOptions,
) -> Result<Vec<T>, ScrapeError>
where
    T: DeserializeOwned + Send,
    C: HttpClient + ?Sized,
{
    let seed = parse_url(seed_url)?;
    let first: CollectionPage<T> = fetch_page(client, seed_url).await?;

    if let Pagination::PageNumber { param } = &options.pagination {
        let last_page = first
            .last_link()
            .and_then(|last| resolve_link(&seed, last).ok())
            .and_then(|last| page_number(&last, param));

        if let Some(last_page) = last_page {
            return crawl_numbered(client, &seed, param, last_page, first, options).await;
        }

        if first.next_link().is_some() {
            log::warn!(
                "{seed_url}: no page count in 'last' link, following 'next' links instead"
            );
        }
    }

    crawl_sequential(client, seed, first, options).await
}

/// Fetches pages `2..=last_page` concurrently and concatenates them after
/// the already-fetched first page.
async fn crawl_numbered<T, C>(
    client: &C,
    seed: &Url,
    param: &str,
    last_page: u32,
    first: CollectionPage<T>,
    options: &CrawlOptions,
) -> Result<Vec<T>, ScrapeError>
where
    T: DeserializeOwned + Send,
    C: HttpClient + ?Sized,
{
    let last_page = last_page.min(options.page_cap());
    log::info!(
        "{seed}: {last_page} page(s), fetching with concurrency {}",
        options.concurrency
    );

    let urls: Vec<String> = (2..=last_page)
        .map(|page| page_url(seed, param, page))
        .collect();

    let mut records = first.data;

    let pages: Vec<CollectionPage<T>> = stream::iter(urls)
        .map(|url| async move { fetch_page::<T, C>(client, &url).await })
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await?;

    for page in pages {
        records.extend(page.data);
    }

    log::info!("{seed}: {} records", records.len());
    Ok(records)
}

/// Follows `next` links one page at a time.
async fn crawl_sequential<T, C>(
    client: &C,
    seed: Url,
    first: CollectionPage<T>,
    options: &CrawlOptions,
) -> Result<Vec<T>, ScrapeError>
where
    T: DeserializeOwned + Send,
    C: HttpClient + ?Sized,
{
    let cap = options.page_cap();
    let mut next = first
        .next_link()
        .map(|link| resolve_link(&seed, link))
        .transpose()?;
    let mut records = first.data;
    let mut fetched: u32 = 1;
    let mut seen = BTreeSet::from([seed.to_string()]);

    while let Some(url) = next.take() {
        if fetched >= cap {
            log::info!("{seed}: reached max pages ({cap}), stopping");
            break;
        }
        if !seen.insert(url.to_string()) {
            log::warn!("{seed}: 'next' link {url} was already visited, stopping");
            break;
        }

        let page: CollectionPage<T> = fetch_page(client, url.as_str()).await?;
        next = page
            .next_link()
            .map(|link| resolve_link(&url, link))
            .transpose()?;
        records.extend(page.data);
        fetched += 1;
    }

    log::info!("{seed}: {fetched} page(s), {} records", records.len());
    Ok(records)
}

fn parse_url(url: &str) -> Result<Url, ScrapeError> {
    Url::parse(url).map_err(|source| ScrapeError::InvalidUrl {
        url: url.to_owned(),
        source,
    })
}

/// Resolves a possibly relative link against the page it appeared on.
fn resolve_link(base: &Url, link: &str) -> Result<Url, ScrapeError> {
    base.join(link).map_err(|source| ScrapeError::InvalidUrl {
        url: link.to_owned(),
        source,
    })
}

/// Reads the page number from `param` in the query of `url`.
fn page_number(url: &Url, param: &str) -> Option<u32> {
    url.query_pairs()
        .find(|(key, _)| key == param)
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Returns `seed` with `param` set to `page`, keeping every other query
/// parameter byte for byte. Some servers treat `+` and `%20` differently,
/// so the query is edited as raw text rather than re-encoded.
fn page_url(seed: &Url, param: &str, page: u32) -> String {
    let mut query: Vec<String> = seed
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(key, _)| key);
            !urlencoding::decode(key).is_ok_and(|key| key == param)
        })
        .map(str::to_owned)
        .collect();
    query.push(format!("{}={page}", urlencoding::encode(param)));

    let mut url = seed.clone();
    url.set_query(Some(&query.join("&")));
    url.to_string()
}
