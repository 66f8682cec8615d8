//! Row filters used by the HTTP API and the CLI.
//!
//! All filters are optional, case-insensitive and AND-combined. Empty strings
//! count as "not set", which is what an HTML form sends for blank inputs.

use serde::de::{self, Deserializer, Unexpected};
use serde::Deserialize;

use crate::models::EnrichedRow;

/// Filters for `GET /api/cancellations`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CancellationQuery {
    /// Substring of the program name.
    pub program: Option<String>,
    /// Substring of the program id.
    pub program_id: Option<String>,
    /// Exact sheet (day) name.
    pub sheet: Option<String>,
    /// Substring of the date range.
    pub date: Option<String>,
    /// `Active` or `Cancelled`.
    pub status: Option<String>,
    /// Whether the row lists cancellation dates.
    #[serde(deserialize_with = "optional_flag")]
    pub has_cancellation: Option<bool>,
}

/// `true` / `false` in any case; blank means not set.
fn optional_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(flag) if flag.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(flag) if flag.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(flag) => Err(de::Error::invalid_value(
            Unexpected::Str(flag),
            &"true or false",
        )),
    }
}

fn active(filter: &Option<String>) -> Option<String> {
    filter
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &Option<String>) -> bool {
    match active(needle) {
        Some(needle) => haystack.to_lowercase().contains(&needle),
        None => true,
    }
}

fn equals(value: &str, expected: &Option<String>) -> bool {
    match active(expected) {
        Some(expected) => value.trim().to_lowercase() == expected,
        None => true,
    }
}

impl CancellationQuery {
    pub fn is_empty(&self) -> bool {
        active(&self.program).is_none()
            && active(&self.program_id).is_none()
            && active(&self.sheet).is_none()
            && active(&self.date).is_none()
            && active(&self.status).is_none()
            && self.has_cancellation.is_none()
    }

    pub fn matches(&self, row: &EnrichedRow) -> bool {
        let row = &row.row;
        contains(&row.program, &self.program)
            && contains(&row.program_id, &self.program_id)
            && equals(&row.sheet, &self.sheet)
            && contains(&row.date_range, &self.date)
            && equals(row.status.as_str(), &self.status)
            && self
                .has_cancellation
                .map_or(true, |wanted| row.has_cancellation() == wanted)
    }

    pub fn apply<'a>(&self, rows: &'a [EnrichedRow]) -> Vec<&'a EnrichedRow> {
        rows.iter().filter(|row| self.matches(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawRow, Status, Withdrawal};
    use serde_json::json;

    fn rows() -> Vec<EnrichedRow> {
        let make = |sheet: &str, program: &str, id: &str, status: Status, cancellations: &str| {
            EnrichedRow {
                row: RawRow {
                    sheet: sheet.into(),
                    program: program.into(),
                    program_id: id.into(),
                    date_range: "01/09/2025 - 30/09/2025".into(),
                    status,
                    cancellation_dates: cancellations.into(),
                    ..Default::default()
                },
                withdrawal: Withdrawal::Yes,
            }
        };
        vec![
            make("Monday", "Aqua Fit", "AF-101", Status::Active, "08/09/2025"),
            make("Wednesday", "Aqua Fit", "AF-101", Status::Active, ""),
            make("Monday", "Yoga Flow", "YG-200", Status::Cancelled, "  "),
        ]
    }

    #[test]
    fn test_empty_query_matches_all() {
        let query = CancellationQuery::default();
        assert!(query.is_empty());
        assert_eq!(query.apply(&rows()).len(), 3);
    }

    #[test]
    fn test_blank_strings_are_ignored() {
        let query = CancellationQuery {
            program: Some("  ".into()),
            sheet: Some(String::new()),
            ..Default::default()
        };
        assert!(query.is_empty());
        assert_eq!(query.apply(&rows()).len(), 3);
    }

    #[test]
    fn test_program_substring_case_insensitive() {
        let query = CancellationQuery {
            program: Some("aqua".into()),
            ..Default::default()
        };
        assert_eq!(query.apply(&rows()).len(), 2);
    }

    #[test]
    fn test_sheet_is_exact() {
        let data = rows();
        let query = CancellationQuery {
            sheet: Some("monday".into()),
            ..Default::default()
        };
        assert_eq!(query.apply(&data).len(), 2);

        let partial = CancellationQuery {
            sheet: Some("Mon".into()),
            ..Default::default()
        };
        assert!(partial.apply(&data).is_empty());
    }

    #[test]
    fn test_filters_are_and_combined() {
        let query = CancellationQuery {
            sheet: Some("Monday".into()),
            program_id: Some("af".into()),
            ..Default::default()
        };
        let data = rows();
        let hits = query.apply(&data);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row.program, "Aqua Fit");
    }

    #[test]
    fn test_status_and_cancellation_filters() {
        let data = rows();

        let cancelled = CancellationQuery {
            status: Some("CANCELLED".into()),
            ..Default::default()
        };
        assert_eq!(cancelled.apply(&data).len(), 1);

        let with_dates = CancellationQuery {
            has_cancellation: Some(true),
            ..Default::default()
        };
        assert_eq!(with_dates.apply(&data).len(), 1);

        let without_dates = CancellationQuery {
            has_cancellation: Some(false),
            ..Default::default()
        };
        assert_eq!(without_dates.apply(&data).len(), 2);
    }

    #[test]
    fn test_date_substring() {
        let query = CancellationQuery {
            date: Some("09/2025".into()),
            ..Default::default()
        };
        assert_eq!(query.apply(&rows()).len(), 3);

        let query = CancellationQuery {
            date: Some("10/2025".into()),
            ..Default::default()
        };
        assert!(query.apply(&rows()).is_empty());
    }

    #[test]
    fn test_has_cancellation_flag_parsing() {
        let parse = |value: &str| {
            serde_json::from_value::<CancellationQuery>(json!({ "has_cancellation": value }))
        };

        assert_eq!(parse("").unwrap().has_cancellation, None);
        assert_eq!(parse(" ").unwrap().has_cancellation, None);
        assert_eq!(parse("TRUE").unwrap().has_cancellation, Some(true));
        assert_eq!(parse("False").unwrap().has_cancellation, Some(false));
        assert!(parse("maybe").is_err());
        assert!(parse("").unwrap().is_empty());
    }
}
