//! File discovery: every downloadable file reachable from a record.

use council_archive_records_models::{FileRef, FileRole, Meeting, Paper, Record};

/// Lists the downloadable files of `record` with the slot each was found
/// in.
///
/// Order is fixed. Papers yield `mainFile` then each `auxiliaryFile`.
/// Meetings yield `invitation`, `resultsProtocol` and `verbatimProtocol`,
/// then the auxiliary files of each agenda item in agenda order. Empty
/// slots and files without any URL are left out.
#[must_use]
pub fn extract_file_refs(record: &Record) -> Vec<(FileRole, &FileRef)> {
    let mut refs = Vec::new();

    match record {
        Record::Paper(paper) => paper_files(paper, &mut refs),
        Record::Meeting(meeting) => meeting_files(meeting, &mut refs),
    }

    refs.retain(|(_, file)| file.is_downloadable());
    refs
}

fn paper_files<'a>(paper: &'a Paper, out: &mut Vec<(FileRole, &'a FileRef)>) {
    out.extend(paper.main_file.iter().map(|f| (FileRole::MainFile, f)));
    out.extend(
        paper
            .auxiliary_file
            .iter()
            .map(|f| (FileRole::AuxiliaryFile, f)),
    );
}

fn meeting_files<'a>(meeting: &'a Meeting, out: &mut Vec<(FileRole, &'a FileRef)>) {
    let slots = [
        (FileRole::Invitation, &meeting.invitation),
        (FileRole::ResultsProtocol, &meeting.results_protocol),
        (FileRole::VerbatimProtocol, &meeting.verbatim_protocol),
    ];
    for (role, slot) in slots {
        out.extend(slot.iter().map(|f| (role, f)));
    }

    for item in &meeting.agenda_item {
        out.extend(
            item.auxiliary_file
                .iter()
                .map(|f| (FileRole::AgendaItemAuxiliaryFile, f)),
        );
    }
}
