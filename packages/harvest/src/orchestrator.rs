//! Harvest orchestration: crawl each collection, then process its records
//! with bounded concurrency.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use council_archive_harvest_models::{EntityOutcome, KindStats, RunStats};
use council_archive_records_models::{Meeting, Paper, Record, RecordKind};
use council_archive_scraper::HttpClient;
use council_archive_scraper::body::Endpoints;
use council_archive_scraper::crawl::{CrawlOptions, crawl_collection};
use futures::{StreamExt as _, stream};

use crate::HarvestError;
use crate::entity::{DEFAULT_DOWNLOAD_CONCURRENCY, EntityContext, process_entity};
use crate::progress::{ProgressCallback, ProgressFactory, null_progress};

/// Default number of entities processed concurrently.
pub const DEFAULT_ENTITY_CONCURRENCY: usize = 5;

/// Settings for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Archive root; `papers/` and `meetings/` are created below it.
    pub root: PathBuf,
    /// Crawl settings shared by both collections.
    pub crawl: CrawlOptions,
    /// Maximum entities processed at once.
    pub entity_concurrency: usize,
    /// Maximum downloads in flight per entity.
    pub download_concurrency: usize,
}

impl HarvestOptions {
    /// Default settings for an archive at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            crawl: CrawlOptions::default(),
            entity_concurrency: DEFAULT_ENTITY_CONCURRENCY,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }
}

/// Runs harvests against one remote.
pub struct Harvester<C> {
    client: C,
    endpoints: Endpoints,
    options: HarvestOptions,
    progress: ProgressFactory,
}

impl<C: HttpClient> Harvester<C> {
    /// Creates a harvester that reports no progress.
    #[must_use]
    pub fn new(client: C, endpoints: Endpoints, options: HarvestOptions) -> Self {
        Self {
            client,
            endpoints,
            options,
            progress: Arc::new(|_: RecordKind| null_progress()),
        }
    }

    /// Sets the factory that supplies a progress handle per record kind.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFactory) -> Self {
        self.progress = progress;
        self
    }

    /// The client used for every request.
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Harvests papers, then meetings.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if a collection crawl fails. Entities
    /// finished before the failure keep their completion markers.
    pub async fn run(&self) -> Result<RunStats, HarvestError> {
        self.run_kinds(RecordKind::ALL).await
    }

    /// Harvests the given kinds in order. Kinds not listed keep zeroed
    /// counters.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if a collection crawl fails.
    pub async fn run_kinds(&self, kinds: &[RecordKind]) -> Result<RunStats, HarvestError> {
        let start = Instant::now();
        let mut stats = RunStats::default();

        for &kind in kinds {
            *stats.get_mut(kind) = self.run_kind(kind).await?;
        }

        log::info!(
            "Harvest finished in {:.1}s: papers {}/{}/{} meetings {}/{}/{} (processed/skipped/errors)",
            start.elapsed().as_secs_f64(),
            stats.papers.processed,
            stats.papers.skipped,
            stats.papers.errors,
            stats.meetings.processed,
            stats.meetings.skipped,
            stats.meetings.errors,
        );

        Ok(stats)
    }

    /// Crawls the collection of `kind` and processes every record in it.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Scrape`] if the crawl fails. No entity is
    /// processed in that case.
    pub async fn run_kind(&self, kind: RecordKind) -> Result<KindStats, HarvestError> {
        let progress = (self.progress)(kind);
        let seed = self.endpoints.for_kind(kind);

        progress.set_message(format!("Crawling {}", kind.namespace()));
        log::info!("Crawling {} from {seed}", kind.namespace());

        let records = match self.crawl(kind, seed).await {
            Ok(records) => records,
            Err(e) => {
                progress.finish_and_clear();
                return Err(e);
            }
        };

        log::info!("Found {} {}", records.len(), kind.namespace());
        progress.set_total(records.len() as u64);
        progress.set_message(format!("Harvesting {}", kind.namespace()));

        let stats = self.process_all(&records, progress.as_ref()).await;

        progress.finish(format!(
            "{}: {} processed, {} skipped, {} errors",
            kind.namespace(),
            stats.processed,
            stats.skipped,
            stats.errors,
        ));

        Ok(stats)
    }

    async fn crawl(&self, kind: RecordKind, seed: &str) -> Result<Vec<Record>, HarvestError> {
        let crawl = &self.options.crawl;

        let records: Vec<Record> = match kind {
            RecordKind::Paper => crawl_collection::<Paper, _>(&self.client, seed, crawl)
                .await?
                .into_iter()
                .map(Record::from)
                .collect(),
            RecordKind::Meeting => crawl_collection::<Meeting, _>(&self.client, seed, crawl)
                .await?
                .into_iter()
                .map(Record::from)
                .collect(),
        };

        Ok(records)
    }

    async fn process_all(&self, records: &[Record], progress: &dyn ProgressCallback) -> KindStats {
        let ctx = EntityContext {
            client: &self.client,
            root: &self.options.root,
            download_concurrency: self.options.download_concurrency,
        };

        stream::iter(records)
            .map(|record| process_entity(&ctx, record))
            .buffer_unordered(self.options.entity_concurrency.max(1))
            .fold(KindStats::default(), |mut stats, outcome: EntityOutcome| {
                stats.record(&outcome);
                progress.inc(1);
                async move { stats }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use council_archive_scraper::mock::MockClient;

    use super::*;

    const PAPERS: &str = "https://example.org/oparl/body/1/paper";
    const MEETINGS: &str = "https://example.org/oparl/body/1/meeting";

    fn slow_remote(papers: u32) -> MockClient {
        let data: Vec<serde_json::Value> = (0..papers)
            .map(|i| {
                serde_json::json!({
                    "id": format!("https://example.org/oparl/paper/{i}"),
                    "reference": format!("DS {i}/2024"),
                    "mainFile": {
                        "id": format!("f{i}"),
                        "accessUrl": format!("https://example.org/files/{i}.pdf")
                    }
                })
            })
            .collect();

        (0..papers).fold(
            MockClient::new()
                .with_json(PAPERS, &serde_json::json!({ "data": data }))
                .with_json(MEETINGS, &serde_json::json!({ "data": [] })),
            |client, i| {
                client.with_delayed_bytes(
                    &format!("https://example.org/files/{i}.pdf"),
                    b"%PDF".to_vec(),
                    Duration::from_millis(50),
                )
            },
        )
    }

    fn harvester(
        client: MockClient,
        root: &std::path::Path,
        entities: usize,
    ) -> Harvester<MockClient> {
        let endpoints = Endpoints {
            papers: PAPERS.to_owned(),
            meetings: MEETINGS.to_owned(),
        };
        let mut options = HarvestOptions::new(root);
        options.entity_concurrency = entities;
        options.download_concurrency = 1;
        Harvester::new(client, endpoints, options)
    }

    #[tokio::test]
    async fn entities_stay_within_configured_width() {
        let dir = tempfile::tempdir().unwrap();
        let harvester = harvester(slow_remote(9), dir.path(), 3);

        let stats = harvester.run_kind(RecordKind::Paper).await.unwrap();

        assert_eq!(stats.processed, 9);
        assert_eq!(stats.files_downloaded, 9);
        assert_eq!(harvester.client().max_in_flight(), 3);
    }

    #[tokio::test]
    async fn default_entity_width_is_five() {
        let dir = tempfile::tempdir().unwrap();
        let harvester = harvester(slow_remote(12), dir.path(), DEFAULT_ENTITY_CONCURRENCY);

        let stats = harvester.run_kind(RecordKind::Paper).await.unwrap();

        assert_eq!(stats.processed, 12);
        assert_eq!(harvester.client().max_in_flight(), 5);
    }

    #[tokio::test]
    async fn zero_width_is_treated_as_one() {
        let dir = tempfile::tempdir().unwrap();
        let harvester = harvester(slow_remote(3), dir.path(), 0);

        let stats = harvester.run_kind(RecordKind::Paper).await.unwrap();

        assert_eq!(stats.processed, 3);
        assert_eq!(harvester.client().max_in_flight(), 1);
    }
}
