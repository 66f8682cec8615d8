//! Snapshot store - the latest completed pass, swapped in atomically.
//!
//! Readers clone an `Arc<Snapshot>` and release the lock immediately, so a
//! pass that is still running never shows through and old snapshots stay
//! valid for as long as a reader holds them.

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::models::{EnrichedRow, ProgramProgress};
use crate::transform::pipeline::{PassOutcome, PassReport, WithdrawalCounts};

/// Immutable result of one ingestion pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// 0 before the first pass, then +1 per publish.
    pub generation: u64,
    pub pass_id: Option<Uuid>,
    pub refreshed_at: Option<DateTime<Local>>,
    pub today: Option<NaiveDate>,
    pub source: String,
    pub outcome: PassOutcome,
    pub rows: Vec<EnrichedRow>,
    pub programs: Vec<ProgramProgress>,
}

impl Snapshot {
    /// Placeholder served until the first pass completes.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            pass_id: None,
            refreshed_at: None,
            today: None,
            source: String::new(),
            outcome: PassOutcome::Ok,
            rows: Vec::new(),
            programs: Vec::new(),
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            generation: self.generation,
            pass_id: self.pass_id,
            refreshed_at: self.refreshed_at,
            today: self.today,
            source: self.source.clone(),
            outcome: self.outcome.clone(),
            total_rows: self.rows.len(),
            total_programs: self.programs.len(),
            withdrawal: WithdrawalCounts::tally(&self.rows),
        }
    }
}

/// Snapshot metadata without the rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub generation: u64,
    pub pass_id: Option<Uuid>,
    pub refreshed_at: Option<DateTime<Local>>,
    pub today: Option<NaiveDate>,
    pub source: String,
    pub outcome: PassOutcome,
    pub total_rows: usize,
    pub total_programs: usize,
    pub withdrawal: WithdrawalCounts,
}

/// Holder of the current snapshot. The ingestor is the only writer.
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
        }
    }

    /// Last completed snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn generation(&self) -> u64 {
        self.current().generation
    }

    /// Replace the current snapshot with the result of a pass.
    /// Returns the new generation.
    pub fn publish(&self, report: PassReport) -> u64 {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let generation = guard.generation + 1;
        *guard = Arc::new(Snapshot {
            generation,
            pass_id: Some(Uuid::new_v4()),
            refreshed_at: Some(Local::now()),
            today: Some(report.today),
            source: report.source,
            outcome: report.outcome,
            rows: report.rows,
            programs: report.programs,
        });
        generation
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
