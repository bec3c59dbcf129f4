#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typed council records and the paginated collection envelope.
//!
//! The remote council information system (an `OParl`-style JSON API)
//! exposes two collections: papers and meetings. Both decode into the
//! types in this crate. Fields this crate does not model explicitly are
//! kept in a flattened `extra` map so that re-serializing a record yields
//! a faithful snapshot of what the remote sent.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Unmodelled JSON fields carried through decode and re-encode.
pub type ExtraFields = BTreeMap<String, serde_json::Value>;

// ── Record kinds and file roles ──────────────────────────────────────────

/// The two record collections exposed by the remote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    /// Legislative papers (motions, reports, resolutions).
    Paper,
    /// Committee and council meetings.
    Meeting,
}

impl RecordKind {
    /// All record kinds in harvest order.
    pub const ALL: &[Self] = &[Self::Paper, Self::Meeting];

    /// Name of the archive directory holding entities of this kind.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Paper => "papers",
            Self::Meeting => "meetings",
        }
    }
}

/// The named slot through which a [`FileRef`] was reached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FileRole {
    /// A paper's primary document.
    MainFile,
    /// One of a paper's attachments.
    AuxiliaryFile,
    /// A meeting's invitation.
    Invitation,
    /// A meeting's results protocol.
    ResultsProtocol,
    /// A meeting's verbatim protocol.
    VerbatimProtocol,
    /// An attachment of one of a meeting's agenda items.
    AgendaItemAuxiliaryFile,
}

// ── Files ────────────────────────────────────────────────────────────────

/// A reference to one remote binary document.
///
/// A file carries no link back to the record that owns it. Ownership is
/// positional: the only way to know which record a file belongs to is to
/// walk the record's slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Stable remote identifier (URI).
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Original file name as reported by the remote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// MIME type (e.g. `application/pdf`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Document date exactly as sent. See [`Self::parsed_date`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Primary URL for accessing the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_url: Option<String>,
    /// Alternate URL that forces a download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Remaining remote fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl FileRef {
    /// Returns the URL a download should start with: the access URL if
    /// present, otherwise the download URL.
    #[must_use]
    pub fn primary_url(&self) -> Option<&str> {
        self.access_url
            .as_deref()
            .or(self.download_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Returns the download URL when it differs from [`Self::primary_url`].
    #[must_use]
    pub fn alternate_url(&self) -> Option<&str> {
        let primary = self.primary_url()?;
        self.download_url
            .as_deref()
            .filter(|url| !url.is_empty() && *url != primary)
    }

    /// The document date, if present and parseable.
    #[must_use]
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }

    /// Whether this file can be downloaded at all.
    #[must_use]
    pub fn is_downloadable(&self) -> bool {
        self.primary_url().is_some()
    }
}

// ── Papers ───────────────────────────────────────────────────────────────

/// A link from a paper to a meeting in which it was discussed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    /// Remote identifier of the consultation itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Identifier of the meeting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<String>,
    /// Identifier of the agenda item within the meeting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agenda_item: Option<String>,
    /// Role of the consultation (e.g. "Beratung", "Entscheidung").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Whether the consulting body decides on the paper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authoritative: Option<bool>,
    /// Remaining remote fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A legislative paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    /// Stable remote identifier (URI).
    pub id: String,
    /// Human reference code, e.g. `"DS 46/2024"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Paper type tag (e.g. "Beschlussvorlage").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_type: Option<String>,
    /// Publication date exactly as sent. See [`Self::parsed_date`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Primary document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_file: Option<FileRef>,
    /// Attachments, in remote order.
    #[serde(
        default,
        deserialize_with = "nullable_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub auxiliary_file: Vec<FileRef>,
    /// Meetings in which this paper was consulted.
    #[serde(
        default,
        deserialize_with = "nullable_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub consultation: Vec<Consultation>,
    /// Identifiers of related papers.
    #[serde(
        default,
        deserialize_with = "nullable_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub related_paper: Vec<String>,
    /// Remaining remote fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

// ── Meetings ─────────────────────────────────────────────────────────────

/// Where a meeting takes place: either a link to a location object or the
/// embedded object itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// URL of a location object.
    Reference(String),
    /// Embedded location object.
    Embedded(EmbeddedLocation),
}

impl Location {
    /// Free-text description, when the location is embedded and has one.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Reference(_) => None,
            Self::Embedded(location) => location.description.as_deref(),
        }
    }
}

/// An embedded location object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedLocation {
    /// Remote identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Free-text description (e.g. "Rathaus, Sitzungssaal").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Remaining remote fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// One item on a meeting's agenda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    /// Remote identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Agenda number as printed (e.g. "Ö 5.1").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Identifier of the consultation this item handles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultation: Option<String>,
    /// Outcome (e.g. "einstimmig beschlossen").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Attachments, in remote order.
    #[serde(
        default,
        deserialize_with = "nullable_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub auxiliary_file: Vec<FileRef>,
    /// Remaining remote fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A committee or council meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// Stable remote identifier (URI).
    pub id: String,
    /// Title, e.g. `"Ortsrat Heyersum (5. Sitzung)"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Start timestamp exactly as sent. See [`Self::start_time`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// End timestamp exactly as sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Identifiers of the organizations holding the meeting.
    #[serde(
        default,
        deserialize_with = "nullable_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub organization: Vec<String>,
    /// Invitation document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation: Option<FileRef>,
    /// Results protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_protocol: Option<FileRef>,
    /// Verbatim protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbatim_protocol: Option<FileRef>,
    /// Agenda, in remote order.
    #[serde(
        default,
        deserialize_with = "nullable_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub agenda_item: Vec<AgendaItem>,
    /// Remaining remote fields.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Paper {
    /// The publication date, if present and parseable.
    #[must_use]
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }
}

impl Meeting {
    /// The start timestamp, if present and a valid RFC 3339 timestamp.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        self.start.as_deref().and_then(parse_timestamp)
    }

    /// The end timestamp, if present and a valid RFC 3339 timestamp.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<FixedOffset>> {
        self.end.as_deref().and_then(parse_timestamp)
    }
}

// ── Record sum type ──────────────────────────────────────────────────────

/// One decoded record from either collection.
///
/// Serializes untagged, i.e. exactly as the wrapped paper or meeting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// A paper.
    Paper(Paper),
    /// A meeting.
    Meeting(Meeting),
}

impl Record {
    /// Which collection this record came from.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Paper(_) => RecordKind::Paper,
            Self::Meeting(_) => RecordKind::Meeting,
        }
    }

    /// Stable remote identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Paper(paper) => &paper.id,
            Self::Meeting(meeting) => &meeting.id,
        }
    }
}

impl From<Paper> for Record {
    fn from(value: Paper) -> Self {
        Self::Paper(value)
    }
}

impl From<Meeting> for Record {
    fn from(value: Meeting) -> Self {
        Self::Meeting(value)
    }
}

// ── Collection envelope ──────────────────────────────────────────────────

/// Navigation links of a collection page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    /// First page.
    #[serde(default)]
    pub first: Option<String>,
    /// Previous page.
    #[serde(default)]
    pub prev: Option<String>,
    /// Next page.
    #[serde(default)]
    pub next: Option<String>,
    /// Last page. Its page-number parameter gives the page count.
    #[serde(default)]
    pub last: Option<String>,
}

/// Counters some servers attach to each page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    /// Number of records across all pages.
    #[serde(default)]
    pub total_elements: Option<u64>,
    /// Records per page.
    #[serde(default)]
    pub elements_per_page: Option<u64>,
    /// This page's number.
    #[serde(default)]
    pub current_page: Option<u64>,
    /// Number of pages.
    #[serde(default)]
    pub total_pages: Option<u64>,
}

/// One page of a remote collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CollectionPage<T> {
    /// The records on this page, in remote order.
    pub data: Vec<T>,
    /// Navigation links.
    #[serde(default)]
    pub links: Option<PageLinks>,
    /// Page counters.
    #[serde(default)]
    pub pagination: Option<PaginationInfo>,
}

impl<T> CollectionPage<T> {
    /// The `next` link, verbatim.
    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        self.links.as_ref()?.next.as_deref()
    }

    /// The `last` link, verbatim.
    #[must_use]
    pub fn last_link(&self) -> Option<&str> {
        self.links.as_ref()?.last.as_deref()
    }
}

/// The body (municipality) object, which links to its collections.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Body {
    /// Remote identifier.
    pub id: String,
    /// Name of the municipality.
    #[serde(default)]
    pub name: Option<String>,
    /// URL of the paper collection.
    #[serde(default)]
    pub paper: Option<String>,
    /// URL of the meeting collection.
    #[serde(default)]
    pub meeting: Option<String>,
}

// ── Deserialization helpers ──────────────────────────────────────────────

/// Treats an explicit JSON `null` like an absent list.
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Date parsing ─────────────────────────────────────────────────────────

/// Parses `YYYY-MM-DD` or a full RFC 3339 timestamp. A timestamp yields
/// its date in its own offset.
///
/// Remote dates are kept as strings on the records, so a malformed value
/// only makes this return `None` and never fails a decode.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

/// Parses an RFC 3339 timestamp, keeping its offset.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw.trim()).ok()
}
