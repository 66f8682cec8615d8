//! REST API response types.
//!
//! Envelopes use camelCase keys; rows keep the snake_case
//! field names of [`EnrichedRow`].

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{EnrichedRow, ProgramProgress};
use crate::query::CancellationQuery;
use crate::store::Snapshot;

/// Body of `GET /api/cancellations`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationsResponse {
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Local>>,
    /// Rows in the snapshot before filtering.
    pub total: usize,
    pub matched: usize,
    pub rows: Vec<EnrichedRow>,
}

impl CancellationsResponse {
    pub fn filtered(snapshot: &Snapshot, query: &CancellationQuery) -> Self {
        let rows: Vec<EnrichedRow> = if query.is_empty() {
            snapshot.rows.clone()
        } else {
            query.apply(&snapshot.rows).into_iter().cloned().collect()
        };
        Self {
            generation: snapshot.generation,
            refreshed_at: snapshot.refreshed_at,
            total: snapshot.rows.len(),
            matched: rows.len(),
            rows,
        }
    }
}

/// Body of `GET /api/programs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramsResponse {
    pub generation: u64,
    pub today: Option<chrono::NaiveDate>,
    pub programs: Vec<ProgramProgress>,
}

impl From<&Snapshot> for ProgramsResponse {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            generation: snapshot.generation,
            today: snapshot.today,
            programs: snapshot.programs.clone(),
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawRow, Status, Withdrawal};

    fn snapshot() -> Snapshot {
        let mut snapshot = Snapshot::empty();
        snapshot.generation = 4;
        snapshot.rows = vec![
            EnrichedRow {
                row: RawRow {
                    sheet: "Monday".into(),
                    program: "Swim".into(),
                    ..Default::default()
                },
                withdrawal: Withdrawal::No,
            },
            EnrichedRow {
                row: RawRow {
                    sheet: "Tuesday".into(),
                    program: "Yoga".into(),
                    status: Status::Cancelled,
                    ..Default::default()
                },
                withdrawal: Withdrawal::Blank,
            },
        ];
        snapshot
    }

    #[test]
    fn test_filtered_response() {
        let query = CancellationQuery {
            sheet: Some("tuesday".into()),
            ..Default::default()
        };
        let response = CancellationsResponse::filtered(&snapshot(), &query);

        assert_eq!(response.generation, 4);
        assert_eq!(response.total, 2);
        assert_eq!(response.matched, 1);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["rows"][0]["program"], "Yoga");
        assert_eq!(value["rows"][0]["withdrawal"], "");
        assert!(value.get("refreshedAt").is_some());
    }

    #[test]
    fn test_error_response() {
        let value = error_response("No file provided");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "No file provided");
    }
}
