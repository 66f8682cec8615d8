//! # Cancellations - withdrawal eligibility for weekday class programs
//!
//! Ingests a workbook of class cancellations (one sheet per weekday), works out
//! how many sessions of each program offering have already run, and serves
//! the rows with a `Yes` / `No` withdrawal flag.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌──────────────┐
//! │  Workbook   │───▶│  Extractor  │───▶│   Grouper   │───▶│  Withdrawal  │
//! │ (xlsx/csv)  │    │  (aliases)  │    │ (id, range) │    │  calculator  │
//! └─────────────┘    └─────────────┘    └─────────────┘    └──────┬───────┘
//!                                                                 │
//!        HTTP API  ◀──  SnapshotStore  ◀──  Ingestor (interval) ◀─┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cancellations::{run_pass, source_for_path};
//!
//! let source = source_for_path("data/cancellations.xlsx");
//! let report = run_pass(source.as_ref(), chrono::Local::now().date_naive());
//! for row in &report.rows {
//!     println!("{} {} -> {}", row.row.sheet, row.row.program, row.withdrawal.as_str());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`models`] - Rows, keys, weekday sets, withdrawal flag
//! - [`parser`] - Workbook and CSV sheet sources
//! - [`transform`] - Extraction, grouping, withdrawal, pipeline
//! - [`store`] - Atomically swapped snapshots
//! - [`ingest`] - Serialized, periodic ingestion passes
//! - [`query`] - Row filters
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Sources
pub mod parser;

// Pipeline
pub mod transform;

// Serving
pub mod ingest;
pub mod query;
pub mod store;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{ConfigError, ServerError, SourceError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    EnrichedRow, ProgramKey, ProgramProgress, RawRow, Status, WeekdaySet, Withdrawal,
};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use parser::{
    read_csv_dir, read_workbook, read_workbook_bytes, source_for_path, CsvDirSource, Sheet,
    TabularSource, Workbook, XlsxSource,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    classes_finished, enrich, extract_rows, group_programs, parse_date_range, process_workbook,
    run_pass, Enrichment, PassOutcome, PassReport, WithdrawalCounts, MIN_FINISHED_CLASSES,
};

// =============================================================================
// Re-exports - Serving
// =============================================================================

pub use config::Settings;
pub use ingest::{spawn_refresh_loop, Ingestor};
pub use query::CancellationQuery;
pub use store::{Snapshot, SnapshotStore, SnapshotSummary};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server, AppState};
}
