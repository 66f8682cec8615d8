//! Turn weekday sheets into [`RawRow`]s.
//!
//! Sheet headers vary between editions of the workbook ("Program ID",
//! "program_id", "ProgramID"...), so each logical field is resolved through an
//! ordered alias list after header normalization.

use std::collections::HashMap;

use crate::models::{RawRow, Status};
use crate::parser::{Sheet, Workbook};

/// Logical columns the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Program,
    ProgramId,
    DateRange,
    Time,
    Location,
    ClassRoom,
    Instructor,
    CancelledFlag,
    CancellationDates,
    Note,
}

/// Accepted header spellings per field, in priority order. Aliases are
/// compared after [`normalize_header`].
pub const FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Program, &["program", "program name", "class", "class name", "course"]),
    (Field::ProgramId, &["program id", "programid", "program code", "id", "code"]),
    (Field::DateRange, &["date range", "dates", "date", "session dates"]),
    (Field::Time, &["time", "class time", "times"]),
    (Field::Location, &["location", "site", "centre", "center"]),
    (Field::ClassRoom, &["class room", "classroom", "room"]),
    (Field::Instructor, &["instructor", "teacher", "coach"]),
    (Field::CancelledFlag, &["actions", "action", "cancelled", "canceled"]),
    (
        Field::CancellationDates,
        &["cancellation dates", "cancellation date", "cancelled dates", "cancellations"],
    ),
    (Field::Note, &["note", "notes", "comments", "comment"]),
];

/// Lowercase, trim, treat `_`/`-` as spaces and collapse whitespace runs.
pub fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Column positions of one sheet, resolved once per sheet.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();

        let columns = FIELD_ALIASES
            .iter()
            .filter_map(|(field, aliases)| {
                aliases
                    .iter()
                    .find_map(|alias| normalized.iter().position(|h| h == alias))
                    .map(|idx| (*field, idx))
            })
            .collect();

        Self { columns }
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Cell text for `field`, or `""` when the column or cell is missing.
    pub fn get<'a>(&self, record: &'a [String], field: Field) -> &'a str {
        self.columns
            .get(&field)
            .and_then(|&idx| record.get(idx))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

/// Build a row from one record; `None` for blank/separator rows.
pub fn extract_row(sheet: &str, columns: &ColumnMap, record: &[String]) -> Option<RawRow> {
    let program = columns.get(record, Field::Program);
    let program_id = columns.get(record, Field::ProgramId);
    if program.is_empty() && program_id.is_empty() {
        return None;
    }

    Some(RawRow {
        sheet: sheet.to_string(),
        program: program.to_string(),
        program_id: program_id.to_string(),
        date_range: columns.get(record, Field::DateRange).to_string(),
        time: columns.get(record, Field::Time).to_string(),
        location: columns.get(record, Field::Location).to_string(),
        class_room: columns.get(record, Field::ClassRoom).to_string(),
        instructor: columns.get(record, Field::Instructor).to_string(),
        status: Status::from_flag(columns.get(record, Field::CancelledFlag)),
        cancellation_dates: columns.get(record, Field::CancellationDates).to_string(),
        note: columns.get(record, Field::Note).to_string(),
    })
}

/// Rows of a single sheet.
pub fn extract_sheet(sheet: &Sheet) -> impl Iterator<Item = RawRow> + '_ {
    let columns = ColumnMap::resolve(&sheet.headers);
    sheet
        .records
        .iter()
        .filter_map(move |record| extract_row(&sheet.name, &columns, record))
}

/// Rows of every sheet, in sheet order.
pub fn extract_rows(workbook: &Workbook) -> impl Iterator<Item = RawRow> + '_ {
    workbook.sheets.iter().flat_map(extract_sheet)
}
