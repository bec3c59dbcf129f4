//! Read-only summary of an archive directory.

use std::io::ErrorKind;
use std::path::Path;

use council_archive_harvest_models::{ArchiveReport, NamespaceReport};
use council_archive_records_models::RecordKind;

use crate::HarvestError;
use crate::entity::{METADATA_FILE, METADATA_TMP_FILE, has_marker};

/// Counts complete and incomplete entities under `root`.
///
/// A namespace directory that does not exist yet counts as empty. Entries
/// that are not directories are ignored.
///
/// # Errors
///
/// Returns [`HarvestError::Filesystem`] if an existing directory cannot be
/// read.
pub async fn inspect_archive(root: &Path) -> Result<ArchiveReport, HarvestError> {
    let mut report = ArchiveReport::default();

    for &kind in RecordKind::ALL {
        let namespace = root.join(kind.namespace());
        let mut entries = match tokio::fs::read_dir(&namespace).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(HarvestError::filesystem(namespace, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HarvestError::filesystem(&namespace, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| HarvestError::filesystem(&path, e))?;
            if !file_type.is_dir() {
                continue;
            }

            let counts = report.get_mut(kind);
            if has_marker(&path).await {
                counts.complete += 1;
                counts.files += count_files(&path).await?;
            } else {
                counts.incomplete += 1;
                report.incomplete_entities.push(format!(
                    "{}/{}",
                    kind.namespace(),
                    entry.file_name().to_string_lossy()
                ));
            }
        }
    }

    report.incomplete_entities.sort();

    log::debug!(
        "Archive at {}: {} papers, {} meetings complete",
        root.display(),
        report.papers.complete,
        report.meetings.complete,
    );

    Ok(report)
}

/// Regular files in `dir` apart from the marker and its scratch file.
async fn count_files(dir: &Path) -> Result<u64, HarvestError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| HarvestError::filesystem(dir, e))?;
    let mut count = 0;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| HarvestError::filesystem(dir, e))?
    {
        let name = entry.file_name();
        if name == METADATA_FILE || name == METADATA_TMP_FILE {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| HarvestError::filesystem(entry.path(), e))?;
        if file_type.is_file() {
            count += 1;
        }
    }

    Ok(count)
}
