//! Row enrichment pipeline.
//!
//! - Extractor: weekday sheets to raw rows
//! - Grouper: raw rows to program offerings
//! - Withdrawal: classes finished and the withdrawal flag
//! - Pipeline: one full ingestion pass

pub mod extractor;
pub mod grouper;
pub mod pipeline;
pub mod withdrawal;

pub use extractor::{extract_rows, ColumnMap, Field, FIELD_ALIASES};
pub use grouper::{group_programs, weekdays_in_label, ProgramGroup, ProgramGroups};
pub use pipeline::*;
pub use withdrawal::{
    cancelled_dates, classes_finished, enrich, parse_date_range, parse_date_tokens,
    program_progress, scheduled_sessions, Enrichment, MIN_FINISHED_CLASSES,
};
