//! Deterministic local names for entities and their files.
//!
//! Every name here is a pure function of record content. Re-running a
//! harvest against an unchanged record always yields the same path, which
//! is what makes the completion marker usable as an idempotency key.

use council_archive_records_models::{FileRef, FileRole, Record};
use url::Url;

/// Longest folder or file name component produced, in characters.
pub const MAX_COMPONENT_LEN: usize = 120;

/// Date part of a meeting folder whose start time is unknown.
pub const UNDATED: &str = "undated";

/// Turns free text (a reference code, a meeting title) into a folder name
/// component.
///
/// Whitespace becomes `_`; `/`, `\` and `:` become `-`; everything else
/// that is not a letter, digit, `-`, `_` or `.` becomes `_`. Leading and
/// trailing dots are removed so the result can never be `.` or `..`.
#[must_use]
pub fn sanitize_component(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_whitespace() => '_',
            '/' | '\\' | ':' => '-',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        })
        .collect();

    mapped
        .trim_matches('.')
        .chars()
        .take(MAX_COMPONENT_LEN)
        .collect()
}

/// Turns a remote file name into a local one.
///
/// Lighter than [`sanitize_component`]: spaces and umlauts survive, only
/// characters that are unsafe in paths on common filesystems are
/// replaced.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = mapped.trim_matches(|c: char| c == '.' || c.is_whitespace());
    truncate_keeping_extension(trimmed, MAX_COMPONENT_LEN)
}

/// Folder name of the local entity for `record`.
///
/// Papers use their reference code (`DS 46/2024` becomes `DS_46-2024`).
/// Meetings use the start date in the meeting's own offset followed by
/// the title (`2022-11-10_Ortsrat_Heyersum__5._Sitzung_`), or `undated`
/// when the start is missing or unparseable. Both fall back to the last
/// segment of the record identifier.
#[must_use]
pub fn folder_name(record: &Record) -> String {
    match record {
        Record::Paper(paper) => non_empty(paper.reference.as_deref().map(sanitize_component))
            .unwrap_or_else(|| id_fallback(&paper.id)),
        Record::Meeting(meeting) => {
            let date = meeting.start_time().map_or_else(
                || UNDATED.to_owned(),
                |start| start.date_naive().format("%Y-%m-%d").to_string(),
            );
            let name = non_empty(meeting.name.as_deref().map(sanitize_component))
                .unwrap_or_else(|| id_fallback(&meeting.id));
            format!("{date}_{name}")
        }
    }
}

/// Local file name for a file downloaded from `url`.
///
/// Uses the remote file name from the URL (percent-decoded, including the
/// query when there is one so that `getfile?id=1` and `getfile?id=2` stay
/// distinct). Falls back to the file's reported `fileName`, then to
/// `<role>_<position>` plus an extension guessed from the MIME type.
#[must_use]
pub fn file_name(file: &FileRef, url: &str, role: FileRole, position: usize) -> String {
    remote_file_name(url)
        .or_else(|| non_empty(file.file_name.as_deref().map(sanitize_file_name)))
        .unwrap_or_else(|| {
            format!(
                "{role}_{position}{}",
                extension_for(file.mime_type.as_deref())
            )
        })
}

fn remote_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rfind(|s| !s.is_empty())?;
    let mut raw = urlencoding::decode(segment).ok()?.into_owned();

    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        raw.push('?');
        raw.push_str(&urlencoding::decode(query).ok()?);
    }

    non_empty(Some(sanitize_file_name(&raw)))
}

fn extension_for(mime_type: Option<&str>) -> &'static str {
    match mime_type.map(str::to_ascii_lowercase).as_deref() {
        Some("application/pdf") => ".pdf",
        Some("text/html") => ".html",
        Some("text/plain") => ".txt",
        Some("image/jpeg") => ".jpg",
        Some("image/png") => ".png",
        Some("application/msword") => ".doc",
        Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document") => {
            ".docx"
        }
        _ => "",
    }
}

fn id_fallback(id: &str) -> String {
    let last = id.trim_end_matches('/').rsplit('/').next().unwrap_or(id);
    non_empty(Some(sanitize_component(last))).unwrap_or_else(|| "unnamed".to_owned())
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.is_empty())
}

/// Truncates to `max` characters, keeping a short extension intact.
fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_owned();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.chars().count() <= 8 => (stem, ext),
        _ => return name.chars().take(max).collect(),
    };

    let keep = max.saturating_sub(ext.chars().count() + 1);
    let mut out: String = stem.chars().take(keep).collect();
    out.push('.');
    out.push_str(ext);
    out
}

#[cfg(test)]
mod tests {
    use council_archive_records_models::{Meeting, Paper};

    use super::*;

    fn paper(json: serde_json::Value) -> Record {
        Record::Paper(serde_json::from_value::<Paper>(json).unwrap())
    }

    fn meeting(json: serde_json::Value) -> Record {
        Record::Meeting(serde_json::from_value::<Meeting>(json).unwrap())
    }

    fn file(json: serde_json::Value) -> FileRef {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn paper_folder_uses_reference() {
        let record = paper(serde_json::json!({
            "id": "https://example.org/oparl/paper/1",
            "reference": "DS 46/2024"
        }));

        assert_eq!(folder_name(&record), "DS_46-2024");
    }

    #[test]
    fn paper_without_reference_uses_id() {
        let record = paper(serde_json::json!({ "id": "https://example.org/oparl/paper/4711/" }));

        assert_eq!(folder_name(&record), "4711");
    }

    #[test]
    fn meeting_folder_uses_local_date_and_name() {
        let record = meeting(serde_json::json!({
            "id": "https://example.org/oparl/meeting/7",
            "name": "Ortsrat Heyersum (5. Sitzung)",
            "start": "2022-11-10T19:00:00+01:00"
        }));

        assert_eq!(
            folder_name(&record),
            "2022-11-10_Ortsrat_Heyersum__5._Sitzung_"
        );
    }

    #[test]
    fn meeting_date_is_taken_in_its_own_offset() {
        let record = meeting(serde_json::json!({
            "id": "https://example.org/oparl/meeting/8",
            "name": "Rat",
            "start": "2023-01-01T00:30:00+01:00"
        }));

        assert_eq!(folder_name(&record), "2023-01-01_Rat");
    }

    #[test]
    fn undated_unnamed_meeting_falls_back_to_id() {
        let record = meeting(serde_json::json!({ "id": "https://example.org/oparl/meeting/99" }));

        assert_eq!(folder_name(&record), "undated_99");
    }

    #[test]
    fn unparseable_start_is_undated() {
        let record = meeting(serde_json::json!({
            "id": "https://example.org/oparl/meeting/12",
            "name": "Rat",
            "start": "10.11.2022 19:00"
        }));

        assert_eq!(folder_name(&record), "undated_Rat");
    }

    #[test]
    fn folder_name_is_deterministic() {
        let json = serde_json::json!({
            "id": "https://example.org/oparl/meeting/7",
            "name": "Bau-, Planungs- und Umweltausschuss",
            "start": "2024-05-02T18:00:00+02:00"
        });

        assert_eq!(
            folder_name(&meeting(json.clone())),
            folder_name(&meeting(json))
        );
    }

    #[test]
    fn sanitize_never_yields_dot_names() {
        assert_eq!(sanitize_component(".."), "");
        assert_eq!(sanitize_component("../etc/passwd"), "-etc-passwd");
        assert_eq!(sanitize_component("a\\b:c"), "a-b-c");
    }

    #[test]
    fn sanitize_keeps_unicode_letters() {
        assert_eq!(sanitize_component("Ausschuss für Straßen"), "Ausschuss_für_Straßen");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "x".repeat(500);

        assert_eq!(sanitize_component(&long).chars().count(), MAX_COMPONENT_LEN);
    }

    #[test]
    fn file_name_from_url_is_decoded() {
        let f = file(serde_json::json!({ "id": "f" }));

        assert_eq!(
            file_name(
                &f,
                "https://example.org/files/Anlage%201%20Lageplan.pdf",
                FileRole::AuxiliaryFile,
                1
            ),
            "Anlage 1 Lageplan.pdf"
        );
    }

    #[test]
    fn file_name_keeps_query_distinct() {
        let f = file(serde_json::json!({ "id": "f" }));

        assert_eq!(
            file_name(
                &f,
                "https://example.org/getfile.asp?id=12&type=do",
                FileRole::MainFile,
                0
            ),
            "getfile.asp_id=12&type=do"
        );
    }

    #[test]
    fn file_name_falls_back_to_reported_name_then_role() {
        let named = file(serde_json::json!({ "id": "f", "fileName": "Protokoll.pdf" }));
        let anonymous = file(serde_json::json!({ "id": "f", "mimeType": "application/pdf" }));

        assert_eq!(
            file_name(&named, "https://example.org/", FileRole::ResultsProtocol, 0),
            "Protokoll.pdf"
        );
        assert_eq!(
            file_name(&anonymous, "https://example.org/", FileRole::Invitation, 2),
            "invitation_2.pdf"
        );
    }

    #[test]
    fn long_file_names_keep_extension() {
        let name = format!("{}.pdf", "a".repeat(300));
        let sanitized = sanitize_file_name(&name);

        assert_eq!(sanitized.chars().count(), MAX_COMPONENT_LEN);
        assert!(sanitized.ends_with(".pdf"));
    }
}
