//! Per-record processing and the on-disk completion marker.
//!
//! [`has_marker`] is the single completion check in the crate: an entity
//! is done if and only if its `metadata.json` exists. The marker is
//! written last, after every download has been attempted, through a
//! temporary file and a rename.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use council_archive_harvest_models::{DownloadTally, EntityOutcome, EntityState};
use council_archive_records_models::{FileRef, FileRole, Record, RecordKind};
use council_archive_scraper::HttpClient;
use futures::{StreamExt as _, stream};

use crate::download::download_file;
use crate::extract::extract_file_refs;
use crate::naming::{file_name, folder_name};
use crate::HarvestError;

/// Name of the completion marker inside an entity directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Scratch name the marker is written to before being renamed into place.
pub const METADATA_TMP_FILE: &str = "metadata.json.tmp";

/// Default number of downloads in flight per entity.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 5;

/// The local directory of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntity {
    /// Record kind, which selects the namespace directory.
    pub kind: RecordKind,
    /// Deterministic folder name.
    pub folder: String,
    /// Full path of the entity directory.
    pub dir: PathBuf,
}

impl LocalEntity {
    /// Locates the entity for `record` under the archive `root`.
    #[must_use]
    pub fn for_record(root: &Path, record: &Record) -> Self {
        let kind = record.kind();
        let folder = folder_name(record);
        let dir = root.join(kind.namespace()).join(&folder);
        Self { kind, folder, dir }
    }

    /// Path of the completion marker.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Whether the completion marker exists.
    pub async fn is_complete(&self) -> bool {
        has_marker(&self.dir).await
    }

    /// Current lifecycle state as seen from disk.
    pub async fn state(&self) -> EntityState {
        if self.is_complete().await {
            EntityState::Skipped
        } else {
            EntityState::Unseen
        }
    }

    /// Creates the entity directory.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Filesystem`] if the directory cannot be
    /// created.
    pub async fn create_dir(&self) -> Result<(), HarvestError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HarvestError::filesystem(&self.dir, e))
    }

    /// Serializes `record` as the completion marker.
    ///
    /// The JSON is written to a temporary file first and renamed into
    /// place, so the marker either exists with full content or not at all.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if serialization, the write, or the rename
    /// fails. No marker exists afterwards.
    pub async fn write_metadata(&self, record: &Record) -> Result<(), HarvestError> {
        let json = serde_json::to_vec_pretty(record)?;
        let tmp = self.dir.join(METADATA_TMP_FILE);

        if let Err(e) = tokio::fs::write(&tmp, &json).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(HarvestError::filesystem(tmp, e));
        }

        let target = self.metadata_path();
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(HarvestError::filesystem(target, e));
        }

        Ok(())
    }
}

/// Whether the entity directory `dir` holds a completion marker.
///
/// An unreadable path counts as incomplete; processing will then surface
/// the underlying problem.
pub async fn has_marker(dir: &Path) -> bool {
    tokio::fs::try_exists(dir.join(METADATA_FILE))
        .await
        .unwrap_or(false)
}

/// Shared settings for processing entities of one run.
#[derive(Debug)]
pub struct EntityContext<'a, C: ?Sized> {
    /// HTTP client for file downloads.
    pub client: &'a C,
    /// Archive root.
    pub root: &'a Path,
    /// Maximum downloads in flight per entity.
    pub download_concurrency: usize,
}

/// One file scheduled for download into an entity directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDownload<'a> {
    /// Slot the file was found in.
    pub role: FileRole,
    /// The file.
    pub file: &'a FileRef,
    /// URL tried first.
    pub url: &'a str,
    /// Local file name inside the entity directory.
    pub file_name: String,
}

/// Assigns a unique local file name to every discovered file.
///
/// A URL that appears more than once (e.g. an attachment shared by two
/// agenda items) is downloaded once. Distinct URLs that map to the same
/// name get a numeric suffix in discovery order, and nothing may shadow
/// the completion marker.
#[must_use]
pub fn plan_downloads<'a>(refs: &[(FileRole, &'a FileRef)]) -> Vec<PlannedDownload<'a>> {
    let mut seen_urls = BTreeSet::new();
    let mut used_names = BTreeSet::new();
    let mut plan = Vec::with_capacity(refs.len());

    for (position, &(role, file)) in refs.iter().enumerate() {
        let Some(url) = file.primary_url() else {
            continue;
        };
        if !seen_urls.insert(url) {
            continue;
        }

        let mut name = file_name(file, url, role, position);
        if name == METADATA_FILE || name == METADATA_TMP_FILE {
            name = format!("{role}_{name}");
        }

        name = unique_name(&used_names, name);
        used_names.insert(name.clone());

        plan.push(PlannedDownload {
            role,
            file,
            url,
            file_name: name,
        });
    }

    plan
}

/// `name` itself if unused, otherwise the first free `stem_N.ext` with
/// `N >= 2`. Suffixed candidates are checked too, since a remote file may
/// already be called `Anlage_2.pdf`.
fn unique_name(used: &BTreeSet<String>, name: String) -> String {
    if !used.contains(&name) {
        return name;
    }
    let mut n = 2;
    loop {
        let candidate = with_suffix(&name, n);
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn with_suffix(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{n}.{ext}"),
        _ => format!("{name}_{n}"),
    }
}

/// Processes one record: skip if already complete, otherwise download its
/// files and write the completion marker.
///
/// Failed downloads are counted in the outcome but do not fail the
/// entity. Any other failure yields [`EntityOutcome::Failed`] and leaves
/// no marker, so the next run starts this entity over.
pub async fn process_entity<C>(ctx: &EntityContext<'_, C>, record: &Record) -> EntityOutcome
where
    C: HttpClient + ?Sized,
{
    let entity = LocalEntity::for_record(ctx.root, record);

    if entity.state().await == EntityState::Skipped {
        log::debug!("[{}] {}: {}", entity.kind, entity.folder, EntityState::Skipped);
        return EntityOutcome::Skipped;
    }

    match materialize(ctx, &entity, record).await {
        Ok(downloads) => {
            log::debug!(
                "[{}] {}: {} ({}/{} files)",
                entity.kind,
                entity.folder,
                EntityState::Done,
                downloads.succeeded,
                downloads.attempted(),
            );
            EntityOutcome::Processed { downloads }
        }
        Err(e) => {
            log::warn!("[{}] {}: {e}", entity.kind, entity.folder);
            EntityOutcome::Failed {
                message: e.to_string(),
            }
        }
    }
}

async fn materialize<C>(
    ctx: &EntityContext<'_, C>,
    entity: &LocalEntity,
    record: &Record,
) -> Result<DownloadTally, HarvestError>
where
    C: HttpClient + ?Sized,
{
    log::trace!("[{}] {}: {}", entity.kind, entity.folder, EntityState::Downloading);
    entity.create_dir().await?;

    let refs = extract_file_refs(record);
    let plan = plan_downloads(&refs);

    let results: Vec<bool> = stream::iter(&plan)
        .map(|planned| async move {
            let dest = entity.dir.join(&planned.file_name);
            download_file(ctx.client, planned.file, &dest).await
        })
        .buffer_unordered(ctx.download_concurrency.max(1))
        .collect()
        .await;

    let mut tally = DownloadTally::default();
    for ok in results {
        tally.record(ok);
    }

    log::trace!("[{}] {}: {}", entity.kind, entity.folder, EntityState::Finalizing);
    entity.write_metadata(record).await?;

    Ok(tally)
}
