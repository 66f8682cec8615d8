//! One ingestion pass: load → extract → group → calculate.
//!
//! # Example
//!
//! ```rust,ignore
//! use cancellations::{run_pass, source_for_path};
//!
//! let source = source_for_path("data/cancellations.xlsx");
//! let report = run_pass(source.as_ref(), chrono::Local::now().date_naive());
//! println!("{} rows, {} offerings", report.rows.len(), report.programs.len());
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;

use super::extractor::{extract_rows, ColumnMap, Field};
use super::withdrawal::enrich;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::{EnrichedRow, ProgramProgress, RawRow, Withdrawal};
use crate::parser::{TabularSource, Workbook};

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum PassOutcome {
    Ok,
    /// The source could not be loaded; the pass produced no rows.
    SourceUnavailable { reason: String },
}

impl PassOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, PassOutcome::Ok)
    }
}

/// Everything one pass produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub today: NaiveDate,
    pub source: String,
    pub rows: Vec<EnrichedRow>,
    pub programs: Vec<ProgramProgress>,
    pub outcome: PassOutcome,
}

/// Row counts per withdrawal value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalCounts {
    pub yes: usize,
    pub no: usize,
    pub blank: usize,
}

impl WithdrawalCounts {
    pub fn tally(rows: &[EnrichedRow]) -> Self {
        rows.iter().fold(Self::default(), |mut counts, row| {
            match row.withdrawal {
                Withdrawal::Yes => counts.yes += 1,
                Withdrawal::No => counts.no += 1,
                Withdrawal::Blank => counts.blank += 1,
            }
            counts
        })
    }
}

/// Run one full pass. Never fails: an unreadable source yields an empty
/// report with [`PassOutcome::SourceUnavailable`].
pub fn run_pass(source: &dyn TabularSource, today: NaiveDate) -> PassReport {
    let started = Instant::now();
    let description = source.describe();
    log_info(format!("Loading {}", description));

    let workbook = match source.load() {
        Ok(workbook) => workbook,
        Err(e) => {
            log_error(format!("Source unavailable: {}", e));
            return PassReport {
                today,
                source: description,
                rows: Vec::new(),
                programs: Vec::new(),
                outcome: PassOutcome::SourceUnavailable {
                    reason: e.to_string(),
                },
            };
        }
    };

    let mut report = process_workbook(&workbook, today);
    report.source = description;
    log_success(format!(
        "Pass finished in {} ms",
        started.elapsed().as_millis()
    ));
    report
}

/// Extract, group and calculate over an already loaded workbook.
pub fn process_workbook(workbook: &Workbook, today: NaiveDate) -> PassReport {
    log_success(format!("Read {} sheets", workbook.sheets.len()));
    for sheet in &workbook.sheets {
        log_info_indent(format!("{}: {} rows", sheet.name, sheet.row_count()), 1);
        let columns = ColumnMap::resolve(&sheet.headers);
        if !columns.has(Field::Program) && !columns.has(Field::ProgramId) {
            log_warning(format!("{}: no program or program id column, sheet skipped", sheet.name));
        }
    }

    let rows: Vec<RawRow> = extract_rows(workbook).collect();
    let dropped = workbook.row_count() - rows.len();
    log_success(format!("Extracted {} program rows", rows.len()));
    if dropped > 0 {
        log_info(format!("Skipped {} blank rows", dropped));
    }

    let enrichment = enrich(rows, today);
    let unparsed = enrichment.programs.iter().filter(|p| p.start.is_none()).count();
    if unparsed > 0 {
        log_warning(format!(
            "{} offerings have an unreadable date range",
            unparsed
        ));
    }

    let counts = WithdrawalCounts::tally(&enrichment.rows);
    log_success(format!(
        "{} offerings as of {}: {} Yes, {} No, {} cancelled",
        enrichment.programs.len(),
        today.format("%d/%m/%Y"),
        counts.yes,
        counts.no,
        counts.blank
    ));

    PassReport {
        today,
        source: String::new(),
        rows: enrichment.rows,
        programs: enrichment.programs,
        outcome: PassOutcome::Ok,
    }
}
