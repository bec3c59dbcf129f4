#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Harvest run statistics, per-entity outcomes, and archive reports.

use council_archive_records_models::RecordKind;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Lifecycle of one record during a harvest.
///
/// `Unseen -> Downloading -> Finalizing -> Done`, or `Unseen -> Skipped`
/// when the completion marker already exists. An entity whose
/// finalization fails has no marker and counts as `Unseen` on the next
/// run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityState {
    /// No completion marker on disk.
    Unseen,
    /// File downloads are in flight.
    Downloading,
    /// Writing the completion marker.
    Finalizing,
    /// Marker written during this run.
    Done,
    /// Marker already present; nothing was done.
    Skipped,
}

/// File download results for one entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTally {
    /// Files written to disk.
    pub succeeded: u64,
    /// Files that could not be fetched or written.
    pub failed: u64,
}

impl DownloadTally {
    /// Counts one download result.
    pub const fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Number of downloads attempted.
    #[must_use]
    pub const fn attempted(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// How processing one record ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntityOutcome {
    /// Downloads attempted and marker written.
    Processed {
        /// Per-file results. Failed files do not make the entity fail.
        downloads: DownloadTally,
    },
    /// Marker already existed.
    Skipped,
    /// Something other than a file download failed; no marker written.
    Failed {
        /// Human-readable cause.
        message: String,
    },
}

/// Counters for one record kind.
///
/// Counters are only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindStats {
    /// Entities whose marker was written in this run.
    pub processed: u64,
    /// Entities skipped because their marker already existed.
    pub skipped: u64,
    /// Entities that failed and were left without a marker.
    pub errors: u64,
    /// Files downloaded across all processed entities.
    pub files_downloaded: u64,
    /// Files that failed to download across all processed entities.
    pub files_failed: u64,
}

impl KindStats {
    /// Folds one entity outcome into the counters.
    pub const fn record(&mut self, outcome: &EntityOutcome) {
        match outcome {
            EntityOutcome::Processed { downloads } => {
                self.processed += 1;
                self.files_downloaded += downloads.succeeded;
                self.files_failed += downloads.failed;
            }
            EntityOutcome::Skipped => self.skipped += 1,
            EntityOutcome::Failed { .. } => self.errors += 1,
        }
    }

    /// Number of entities seen.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.processed + self.skipped + self.errors
    }
}

/// Aggregated statistics of one harvest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Paper counters.
    pub papers: KindStats,
    /// Meeting counters.
    pub meetings: KindStats,
}

impl RunStats {
    /// Counters for `kind`.
    #[must_use]
    pub const fn get(&self, kind: RecordKind) -> &KindStats {
        match kind {
            RecordKind::Paper => &self.papers,
            RecordKind::Meeting => &self.meetings,
        }
    }

    /// Mutable counters for `kind`.
    pub const fn get_mut(&mut self, kind: RecordKind) -> &mut KindStats {
        match kind {
            RecordKind::Paper => &mut self.papers,
            RecordKind::Meeting => &mut self.meetings,
        }
    }

    /// Entity errors across both kinds.
    #[must_use]
    pub const fn total_errors(&self) -> u64 {
        self.papers.errors + self.meetings.errors
    }
}

/// Contents of one archive namespace (`papers/` or `meetings/`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceReport {
    /// Directories with a completion marker.
    pub complete: u64,
    /// Directories without a marker; the next run reprocesses them.
    pub incomplete: u64,
    /// Files other than the marker inside complete directories.
    pub files: u64,
}

/// Snapshot of what is on disk under an archive root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    /// Paper namespace.
    pub papers: NamespaceReport,
    /// Meeting namespace.
    pub meetings: NamespaceReport,
    /// Folder names of incomplete entities, as `namespace/folder`.
    pub incomplete_entities: Vec<String>,
}

impl ArchiveReport {
    /// Report for `kind`'s namespace.
    pub const fn get_mut(&mut self, kind: RecordKind) -> &mut NamespaceReport {
        match kind {
            RecordKind::Paper => &mut self.papers,
            RecordKind::Meeting => &mut self.meetings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_outcomes_into_independent_counters() {
        let mut stats = KindStats::default();

        stats.record(&EntityOutcome::Processed {
            downloads: DownloadTally {
                succeeded: 2,
                failed: 1,
            },
        });
        stats.record(&EntityOutcome::Skipped);
        stats.record(&EntityOutcome::Skipped);
        stats.record(&EntityOutcome::Failed {
            message: "disk full".to_string(),
        });

        assert_eq!(
            stats,
            KindStats {
                processed: 1,
                skipped: 2,
                errors: 1,
                files_downloaded: 2,
                files_failed: 1,
            }
        );
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn download_tally_counts_both_sides() {
        let mut tally = DownloadTally::default();
        tally.record(true);
        tally.record(false);
        tally.record(true);

        assert_eq!(tally.succeeded, 2);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.attempted(), 3);
    }

    #[test]
    fn run_stats_are_kept_per_kind() {
        let mut stats = RunStats::default();
        stats.get_mut(RecordKind::Meeting).record(&EntityOutcome::Failed {
            message: "x".to_string(),
        });

        assert_eq!(stats.get(RecordKind::Paper).errors, 0);
        assert_eq!(stats.get(RecordKind::Meeting).errors, 1);
        assert_eq!(stats.total_errors(), 1);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(EntityOutcome::Skipped).unwrap();

        assert_eq!(json, serde_json::json!({ "outcome": "skipped" }));
    }
}
