#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resumable harvester for council papers and meetings.
//!
//! A harvest crawls both remote collections and materializes every record
//! as a directory under the archive root:
//!
//! ```text
//! <root>/papers/DS_46-2024/metadata.json
//! <root>/papers/DS_46-2024/a.pdf
//! <root>/meetings/2022-11-10_Ortsrat_Heyersum__5._Sitzung_/metadata.json
//! ```
//!
//! `metadata.json` is written last and is the only completion marker: an
//! entity directory that has one is never touched again, one that lacks
//! one is reprocessed from scratch. Failed file downloads never prevent
//! the marker from being written.

pub mod config;
pub mod download;
pub mod entity;
pub mod extract;
pub mod inspect;
pub mod naming;
pub mod orchestrator;
pub mod progress;

use std::path::PathBuf;

pub use config::HarvestConfig;
pub use council_archive_harvest_models::{EntityOutcome, KindStats, RunStats};
pub use orchestrator::{HarvestOptions, Harvester};

use council_archive_scraper::ScrapeError;

/// Errors that can occur during a harvest.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Talking to the remote failed.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// Creating a directory or writing a file failed.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path being created or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be encoded as JSON.
    #[error("failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The configuration file could not be read or parsed.
    #[error("failed to load config {}: {message}", .path.display())]
    ConfigFile {
        /// Config file path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The configuration is incomplete or out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HarvestError {
    /// Wraps an I/O error with the path it concerns.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
