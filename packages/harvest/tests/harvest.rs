use std::collections::BTreeMap;
use std::path::Path;

use council_archive_harvest::inspect::inspect_archive;
use council_archive_harvest::{HarvestError, HarvestOptions, Harvester, KindStats};
use council_archive_records_models::RecordKind;
use council_archive_scraper::ScrapeError;
use council_archive_scraper::body::Endpoints;
use council_archive_scraper::mock::{MockClient, MockResponse};
use serde_json::{Value, json};

const PAPERS: &str = "https://ratsinfo.example.org/oparl/body/1/paper";
const PAPERS_PAGE_2: &str = "https://ratsinfo.example.org/oparl/body/1/paper?page=2";
const MEETINGS: &str = "https://ratsinfo.example.org/oparl/body/1/meeting";
const FILES: &str = "https://ratsinfo.example.org/files";

const PAPER_DIR: &str = "papers/DS_46-2024";
const MEETING_DIR: &str = "meetings/2022-11-10_Ortsrat_Heyersum__5._Sitzung_";

fn file(name: &str) -> Value {
    json!({
        "id": format!("https://ratsinfo.example.org/oparl/file/{name}"),
        "name": name,
        "mimeType": "application/pdf",
        "accessUrl": format!("{FILES}/{name}.pdf"),
    })
}

fn ds_46_paper() -> Value {
    json!({
        "id": "https://ratsinfo.example.org/oparl/paper/46",
        "type": "https://schema.oparl.org/1.1/Paper",
        "reference": "DS 46/2024",
        "name": "Bebauungsplan Nr. 12",
        "mainFile": file("a"),
        "auxiliaryFile": [file("b")]
    })
}

fn file_less_paper(n: u32) -> Value {
    json!({
        "id": format!("https://ratsinfo.example.org/oparl/paper/{n}"),
        "reference": format!("DS {n}/2024"),
    })
}

fn heyersum_meeting() -> Value {
    json!({
        "id": "https://ratsinfo.example.org/oparl/meeting/5",
        "name": "Ortsrat Heyersum (5. Sitzung)",
        "start": "2022-11-10T19:00:00+01:00",
        "invitation": file("einladung"),
        "resultsProtocol": file("protokoll"),
        "verbatimProtocol": null,
        "agendaItem": [{ "number": "1", "name": "Eröffnung" }]
    })
}

fn page(data: Vec<Value>, last: Option<&str>) -> Value {
    match last {
        Some(last) => json!({ "data": data, "links": { "last": last } }),
        None => json!({ "data": data, "links": {} }),
    }
}

/// A remote with two paper pages and one meeting page.
fn remote() -> MockClient {
    MockClient::new()
        .with_json(
            PAPERS,
            &page(vec![ds_46_paper(), file_less_paper(47)], Some(PAPERS_PAGE_2)),
        )
        .with_json(
            PAPERS_PAGE_2,
            &page(vec![file_less_paper(48)], Some(PAPERS_PAGE_2)),
        )
        .with_json(MEETINGS, &page(vec![heyersum_meeting()], None))
        .with_bytes(&format!("{FILES}/a.pdf"), b"%PDF a".to_vec())
        .with_bytes(&format!("{FILES}/b.pdf"), b"%PDF b".to_vec())
        .with_bytes(&format!("{FILES}/einladung.pdf"), b"%PDF einladung".to_vec())
        .with_bytes(&format!("{FILES}/protokoll.pdf"), b"%PDF protokoll".to_vec())
}

fn harvester(client: MockClient, root: &Path) -> Harvester<MockClient> {
    let endpoints = Endpoints {
        papers: PAPERS.to_owned(),
        meetings: MEETINGS.to_owned(),
    };
    Harvester::new(client, endpoints, HarvestOptions::new(root))
}

/// Relative path and contents of every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn file_requests(client: &MockClient) -> Vec<String> {
    client
        .requests()
        .into_iter()
        .filter(|url| url.starts_with(FILES))
        .collect()
}

#[tokio::test]
async fn paper_scenario_then_rerun_is_a_pure_skip() {
    let dir = tempfile::tempdir().unwrap();
    let harvester = harvester(remote(), dir.path());

    let first = harvester.run().await.unwrap();

    assert_eq!(
        first.papers,
        KindStats {
            processed: 3,
            skipped: 0,
            errors: 0,
            files_downloaded: 2,
            files_failed: 0,
        }
    );
    let paper_dir = dir.path().join(PAPER_DIR);
    assert_eq!(file_names(&paper_dir), ["a.pdf", "b.pdf", "metadata.json"]);
    assert_eq!(std::fs::read(paper_dir.join("a.pdf")).unwrap(), b"%PDF a");

    harvester
        .client()
        .set(&format!("{FILES}/b.pdf"), MockResponse::Status(500));
    harvester.client().clear_requests();

    let second = harvester.run().await.unwrap();

    assert_eq!(
        second.papers,
        KindStats {
            skipped: 3,
            ..KindStats::default()
        }
    );
    assert!(file_requests(harvester.client()).is_empty());
}

#[tokio::test]
async fn meeting_scenario_downloads_only_present_slots() {
    let dir = tempfile::tempdir().unwrap();
    let harvester = harvester(remote(), dir.path());

    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.meetings.processed, 1);
    assert_eq!(stats.meetings.files_downloaded, 2);
    assert_eq!(stats.meetings.files_failed, 0);
    assert_eq!(
        file_names(&dir.path().join(MEETING_DIR)),
        ["einladung.pdf", "metadata.json", "protokoll.pdf"]
    );
}

#[tokio::test]
async fn metadata_is_the_remote_record() {
    let dir = tempfile::tempdir().unwrap();
    let harvester = harvester(remote(), dir.path());

    harvester.run().await.unwrap();

    let written: Value = serde_json::from_slice(
        &std::fs::read(dir.path().join(PAPER_DIR).join("metadata.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written, ds_46_paper());
}

#[tokio::test]
async fn second_run_leaves_archive_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let harvester = harvester(remote(), dir.path());

    harvester.run().await.unwrap();
    let before = snapshot(dir.path());
    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.papers.processed + stats.meetings.processed, 0);
    assert_eq!(stats.papers.skipped + stats.meetings.skipped, 4);
    assert_eq!(snapshot(dir.path()), before);
}

#[tokio::test]
async fn failing_attachment_does_not_fail_the_entity() {
    let dir = tempfile::tempdir().unwrap();
    let client = remote().with_status(&format!("{FILES}/b.pdf"), 404);
    let harvester = harvester(client, dir.path());

    let stats = harvester.run_kind(RecordKind::Paper).await.unwrap();

    assert_eq!(stats.processed, 3);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.files_downloaded, 1);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(
        file_names(&dir.path().join(PAPER_DIR)),
        ["a.pdf", "metadata.json"]
    );
}

#[tokio::test]
async fn interrupted_entity_is_reprocessed() {
    let dir = tempfile::tempdir().unwrap();
    let paper_dir = dir.path().join(PAPER_DIR);
    std::fs::create_dir_all(&paper_dir).unwrap();
    std::fs::write(paper_dir.join("a.pdf"), b"%PD").unwrap();
    let harvester = harvester(remote(), dir.path());

    let stats = harvester.run_kind(RecordKind::Paper).await.unwrap();

    assert_eq!(stats.processed, 3);
    assert_eq!(harvester.client().request_count(&format!("{FILES}/a.pdf")), 1);
    assert_eq!(std::fs::read(paper_dir.join("a.pdf")).unwrap(), b"%PDF a");
    assert!(paper_dir.join("metadata.json").is_file());
}

#[tokio::test]
async fn crawl_failure_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let client = remote().with_status(PAPERS_PAGE_2, 502);
    let harvester = harvester(client, dir.path());

    let result = harvester.run().await;

    assert!(matches!(
        result,
        Err(HarvestError::Scrape(ScrapeError::HttpStatus { status: 502, .. }))
    ));
    assert!(!dir.path().join("papers").exists());
    assert_eq!(harvester.client().request_count(MEETINGS), 0);
}

#[tokio::test]
async fn entity_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("papers")).unwrap();
    // A regular file where the entity directory should go.
    std::fs::write(dir.path().join("papers/DS_47-2024"), b"").unwrap();
    let harvester = harvester(remote(), dir.path());

    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.papers.errors, 1);
    assert_eq!(stats.papers.processed, 2);
    assert_eq!(stats.meetings.processed, 1);
    assert_eq!(stats.total_errors(), 1);
}

#[tokio::test]
async fn only_meetings_leaves_papers_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let harvester = harvester(remote(), dir.path());

    let stats = harvester.run_kinds(&[RecordKind::Meeting]).await.unwrap();

    assert_eq!(stats.papers, KindStats::default());
    assert_eq!(stats.meetings.processed, 1);
    assert_eq!(harvester.client().request_count(PAPERS), 0);
    assert!(!dir.path().join("papers").exists());
}

#[tokio::test]
async fn inspection_matches_harvest() {
    let dir = tempfile::tempdir().unwrap();
    let harvester = harvester(remote(), dir.path());

    harvester.run().await.unwrap();
    let report = inspect_archive(dir.path()).await.unwrap();

    assert_eq!(report.papers.complete, 3);
    assert_eq!(report.papers.files, 2);
    assert_eq!(report.meetings.complete, 1);
    assert_eq!(report.meetings.files, 2);
    assert!(report.incomplete_entities.is_empty());
}
