//! Harvest configuration loaded from an optional TOML file.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Command-line flags override file values after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use council_archive_scraper::HttpClient;
use council_archive_scraper::body::{Endpoints, discover_endpoints};
use council_archive_scraper::crawl::{CrawlOptions, DEFAULT_PAGE_CONCURRENCY, Pagination};
use serde::{Deserialize, Serialize};

use crate::HarvestError;
use crate::entity::DEFAULT_DOWNLOAD_CONCURRENCY;
use crate::orchestrator::{DEFAULT_ENTITY_CONCURRENCY, HarvestOptions};

/// Default archive root, relative to the working directory.
pub const DEFAULT_TARGET_DIR: &str = "documents";

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("council-archive/", env!("CARGO_PKG_VERSION"));

/// How page URLs are derived during a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    /// Read the page count from the `last` link and fetch pages by number.
    #[default]
    PageNumber,
    /// Follow `next` links one page at a time.
    FollowNext,
}

/// Settings for a harvest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Archive root directory.
    pub target_dir: PathBuf,
    /// Seed URL of the paper collection.
    pub papers_url: Option<String>,
    /// Seed URL of the meeting collection.
    pub meetings_url: Option<String>,
    /// Body object URL used to discover collection URLs that are not set
    /// explicitly.
    pub body_url: Option<String>,
    /// Page addressing strategy.
    pub pagination: PaginationMode,
    /// Query parameter carrying the page number.
    pub page_param: String,
    /// Page requests in flight per crawl.
    pub page_concurrency: usize,
    /// Entities processed at once.
    pub entity_concurrency: usize,
    /// Downloads in flight per entity.
    pub download_concurrency: usize,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Whole-request timeout in seconds. Unset means no timeout.
    pub request_timeout_secs: Option<u64>,
    /// Stop each crawl after this many pages.
    pub max_pages: Option<u32>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from(DEFAULT_TARGET_DIR),
            papers_url: None,
            meetings_url: None,
            body_url: None,
            pagination: PaginationMode::default(),
            page_param: "page".to_owned(),
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            entity_concurrency: DEFAULT_ENTITY_CONCURRENCY,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout_secs: None,
            max_pages: None,
        }
    }
}

impl HarvestConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] on malformed TOML, unknown keys,
    /// or values of the wrong type.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, HarvestError> {
        toml::from_str(toml_str).map_err(|e| HarvestError::Config(e.to_string()))
    }

    /// Reads and parses the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::ConfigFile`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, HarvestError> {
        let config_file = |message: String| HarvestError::ConfigFile {
            path: path.to_path_buf(),
            message,
        };

        let contents = std::fs::read_to_string(path).map_err(|e| config_file(e.to_string()))?;
        let config = Self::from_toml_str(&contents).map_err(|e| match e {
            HarvestError::Config(message) => config_file(message),
            other => other,
        })?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges and that both collections can be located.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), HarvestError> {
        for (name, value) in [
            ("page_concurrency", self.page_concurrency),
            ("entity_concurrency", self.entity_concurrency),
            ("download_concurrency", self.download_concurrency),
        ] {
            if value == 0 {
                return Err(HarvestError::Config(format!("{name} must be at least 1")));
            }
        }

        if self.max_pages == Some(0) {
            return Err(HarvestError::Config(
                "max_pages must be at least 1".to_owned(),
            ));
        }

        if self.page_param.trim().is_empty() {
            return Err(HarvestError::Config("page_param must not be empty".to_owned()));
        }

        let explicit = self.papers_url.is_some() && self.meetings_url.is_some();
        if !explicit && self.body_url.is_none() {
            return Err(HarvestError::Config(
                "set both papers_url and meetings_url, or body_url".to_owned(),
            ));
        }

        Ok(())
    }

    /// Request timeout, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Crawl settings derived from this configuration.
    #[must_use]
    pub fn crawl_options(&self) -> CrawlOptions {
        let pagination = match self.pagination {
            PaginationMode::PageNumber => Pagination::PageNumber {
                param: self.page_param.clone(),
            },
            PaginationMode::FollowNext => Pagination::FollowNext,
        };

        CrawlOptions::default()
            .with_pagination(pagination)
            .with_concurrency(self.page_concurrency)
            .with_max_pages(self.max_pages)
    }

    /// Harvester settings derived from this configuration.
    #[must_use]
    pub fn harvest_options(&self) -> HarvestOptions {
        HarvestOptions {
            root: self.target_dir.clone(),
            crawl: self.crawl_options(),
            entity_concurrency: self.entity_concurrency,
            download_concurrency: self.download_concurrency,
        }
    }

    /// Seed URLs for both collections.
    ///
    /// Explicit URLs win. A missing one is taken from the body object at
    /// `body_url`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Config`] if a URL is missing and no body
    /// URL is configured, or [`HarvestError::Scrape`] if discovery fails.
    pub async fn resolve_endpoints<C>(&self, client: &C) -> Result<Endpoints, HarvestError>
    where
        C: HttpClient + ?Sized,
    {
        if let (Some(papers), Some(meetings)) = (&self.papers_url, &self.meetings_url) {
            return Ok(Endpoints {
                papers: papers.clone(),
                meetings: meetings.clone(),
            });
        }

        let Some(body_url) = &self.body_url else {
            return Err(HarvestError::Config(
                "no collection URLs and no body_url configured".to_owned(),
            ));
        };

        let discovered = discover_endpoints(client, body_url).await?;

        Ok(Endpoints {
            papers: self.papers_url.clone().unwrap_or(discovered.papers),
            meetings: self.meetings_url.clone().unwrap_or(discovered.meetings),
        })
    }
}
