//! Best-effort single-file download.

use std::path::Path;

use council_archive_records_models::FileRef;
use council_archive_scraper::HttpClient;

use crate::HarvestError;

/// Fetches `file` and writes it to `dest`, creating parent directories as
/// needed. An existing file at `dest` is overwritten.
///
/// The access URL is tried first. If it fails and the file has a
/// different download URL, that one is tried once.
///
/// Never fails past this boundary: network errors, non-2xx responses and
/// write errors are logged and reported as `false`.
pub async fn download_file<C>(client: &C, file: &FileRef, dest: &Path) -> bool
where
    C: HttpClient + ?Sized,
{
    let Some(url) = file.primary_url() else {
        log::warn!("{} has no URL to download from", file.id);
        return false;
    };

    let err = match fetch_to_path(client, url, dest).await {
        Ok(bytes) => {
            log::debug!("Downloaded {url} -> {} ({bytes} bytes)", dest.display());
            return true;
        }
        Err(e) => e,
    };

    let Some(alternate) = file.alternate_url() else {
        log::warn!("Download failed for {url}: {err}");
        return false;
    };

    log::debug!("Download failed for {url}: {err}, trying {alternate}");
    match fetch_to_path(client, alternate, dest).await {
        Ok(bytes) => {
            log::debug!("Downloaded {alternate} -> {} ({bytes} bytes)", dest.display());
            true
        }
        Err(e) => {
            log::warn!("Download failed for {url} and {alternate}: {e}");
            false
        }
    }
}

async fn fetch_to_path<C>(client: &C, url: &str, dest: &Path) -> Result<usize, HarvestError>
where
    C: HttpClient + ?Sized,
{
    let body = client.get_bytes(url).await?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HarvestError::filesystem(parent, e))?;
    }

    tokio::fs::write(dest, &body)
        .await
        .map_err(|e| HarvestError::filesystem(dest, e))?;

    Ok(body.len())
}

#[cfg(test)]
mod tests {
    use council_archive_scraper::mock::MockClient;

    use super::*;

    const URL: &str = "https://example.org/files/a.pdf";
    const ALT_URL: &str = "https://example.org/download/a.pdf";

    fn file() -> FileRef {
        serde_json::from_value(serde_json::json!({ "id": "f", "accessUrl": URL })).unwrap()
    }

    fn file_with_alternate() -> FileRef {
        serde_json::from_value(serde_json::json!({
            "id": "f",
            "accessUrl": URL,
            "downloadUrl": ALT_URL
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn writes_body_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("papers").join("DS_1-2024").join("a.pdf");
        let client = MockClient::new().with_bytes(URL, b"%PDF-1.7".to_vec());

        assert!(download_file(&client, &file(), &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.pdf");
        std::fs::write(&dest, b"stale partial download").unwrap();
        let client = MockClient::new().with_bytes(URL, b"fresh".to_vec());

        assert!(download_file(&client, &file(), &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn http_error_is_false_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.pdf");
        let client = MockClient::new().with_status(URL, 404);

        assert!(!download_file(&client, &file(), &dest).await);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn transport_error_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockClient::new().with_transport_failure(URL);

        assert!(!download_file(&client, &file(), &dir.path().join("a.pdf")).await);
    }

    #[tokio::test]
    async fn write_error_is_false() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();
        let client = MockClient::new().with_bytes(URL, b"data".to_vec());

        assert!(!download_file(&client, &file(), &blocker.join("a.pdf")).await);
    }

    #[tokio::test]
    async fn falls_back_to_download_url_once() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.pdf");
        let client = MockClient::new()
            .with_status(URL, 500)
            .with_bytes(ALT_URL, b"alt".to_vec());

        assert!(download_file(&client, &file_with_alternate(), &dest).await);
        assert_eq!(std::fs::read(&dest).unwrap(), b"alt");
        assert_eq!(client.requests(), [URL, ALT_URL]);
    }

    #[tokio::test]
    async fn alternate_is_not_tried_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockClient::new().with_bytes(URL, b"a".to_vec());

        assert!(download_file(&client, &file_with_alternate(), &dir.path().join("a.pdf")).await);
        assert_eq!(client.request_count(ALT_URL), 0);
    }

    #[tokio::test]
    async fn both_urls_failing_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockClient::new()
            .with_status(URL, 500)
            .with_transport_failure(ALT_URL);

        assert!(!download_file(&client, &file_with_alternate(), &dir.path().join("a.pdf")).await);
        assert_eq!(client.requests().len(), 2);
    }
}
