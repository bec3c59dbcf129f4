//! Progress reporting for harvest runs.
//!
//! The harvester reports per-kind progress through [`ProgressCallback`]
//! and knows nothing about how it is rendered. The CLI plugs in terminal
//! progress bars; library callers and tests use [`null_progress`].

use std::sync::Arc;

use council_archive_records_models::RecordKind;

/// Receives progress updates while one collection is harvested.
///
/// Implementations must be `Send + Sync`: entities of one kind are
/// processed concurrently and all report through the same handle.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of entities expected (known once the crawl ends).
    fn set_total(&self, total: u64);

    /// Advances by `delta` finished entities.
    fn inc(&self, delta: u64);

    /// Replaces the status text.
    fn set_message(&self, msg: String);

    /// Marks the kind as finished with a summary line.
    fn finish(&self, msg: String);

    /// Marks the kind as finished and removes the indicator.
    fn finish_and_clear(&self);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

/// Creates the progress handle for one record kind at the start of its
/// harvest.
pub type ProgressFactory = Arc<dyn Fn(RecordKind) -> Arc<dyn ProgressCallback> + Send + Sync>;
