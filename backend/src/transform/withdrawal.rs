//! Withdrawal eligibility per program offering.
//!
//! For each offering the session calendar is rebuilt from its date range and
//! weekdays, cancelled dates are removed, and sessions on or before today are
//! counted. Once [`MIN_FINISHED_CLASSES`] sessions have run the offering shows
//! `"No"`; before that it shows `"Yes"`. Rows individually flagged as cancelled
//! always show a blank status.
//!
//! Every parse failure degrades to zero finished classes, so a malformed row
//! surfaces as `"Yes"` instead of blocking ingestion.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use super::grouper::{group_programs, ProgramGroup};
use crate::models::{EnrichedRow, ProgramKey, ProgramProgress, RawRow, WeekdaySet, Withdrawal};

/// Finished classes at which withdrawal is no longer offered.
pub const MIN_FINISHED_CLASSES: usize = 3;

/// Slash-separated ASCII digit runs. Runs are maximal, so `123/09/2025` is
/// one malformed token rather than `23/09/2025`; letters may touch a token.
static DATE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+)/([0-9]+)/([0-9]+)").expect("static date pattern"));

impl Withdrawal {
    pub fn from_classes_finished(classes_finished: usize) -> Self {
        if classes_finished >= MIN_FINISHED_CLASSES {
            Withdrawal::No
        } else {
            Withdrawal::Yes
        }
    }
}

/// `(day, month, year)` digit groups shaped like `DD/MM/YYYY`, whether or
/// not they name a calendar date.
fn date_tokens(text: &str) -> impl Iterator<Item = (&str, &str, &str)> {
    DATE_TOKEN.captures_iter(text).filter_map(|caps| {
        let (_, [day, month, year]) = caps.extract();
        (day.len() == 2 && month.len() == 2 && year.len() == 4).then_some((day, month, year))
    })
}

fn to_date((day, month, year): (&str, &str, &str)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Every real `DD/MM/YYYY` date in free text, in order of appearance.
/// Tokens that are not calendar dates (`31/02/2025`) are skipped.
pub fn parse_date_tokens(text: &str) -> Vec<NaiveDate> {
    date_tokens(text).filter_map(to_date).collect()
}

/// Start and end of a range holding exactly two `DD/MM/YYYY` tokens.
pub fn parse_date_range(text: &str) -> Option<(NaiveDate, NaiveDate)> {
    let tokens: Vec<_> = date_tokens(text).collect();
    match tokens.as_slice() {
        [start, end] => Some((to_date(*start)?, to_date(*end)?)),
        _ => None,
    }
}

/// Session dates from `start` to `min(end, today)` falling on `weekdays`.
pub fn scheduled_sessions(
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    weekdays: WeekdaySet,
) -> Vec<NaiveDate> {
    let last = end.min(today);
    if weekdays.is_empty() || start > last {
        return Vec::new();
    }

    start
        .iter_days()
        .take_while(|d| *d <= last)
        .filter(|d| weekdays.contains(d.weekday()))
        .collect()
}

/// Union of cancellation dates over every row of the group.
pub fn cancelled_dates(group: &ProgramGroup<'_>) -> BTreeSet<NaiveDate> {
    group
        .rows
        .iter()
        .flat_map(|row| parse_date_tokens(&row.cancellation_dates))
        .collect()
}

/// Withdrawal computation for one offering.
pub fn program_progress(group: &ProgramGroup<'_>, today: NaiveDate) -> ProgramProgress {
    let range = parse_date_range(&group.key.date_range);

    let (scheduled, cancelled_sessions, classes_finished) = match range {
        Some((start, end)) => {
            let cancelled = cancelled_dates(group);
            let sessions = scheduled_sessions(start, end, today, group.weekdays);
            let cancelled_count = sessions.iter().filter(|d| cancelled.contains(*d)).count();
            (sessions.len(), cancelled_count, sessions.len() - cancelled_count)
        }
        None => (0, 0, 0),
    };

    ProgramProgress {
        program_id: group.key.program_id.clone(),
        date_range: group.key.date_range.clone(),
        program: group.program().to_string(),
        sheets: group.sheets(),
        weekdays: group.weekdays,
        start: range.map(|(start, _)| start),
        end: range.map(|(_, end)| end),
        scheduled_sessions: scheduled,
        cancelled_sessions,
        classes_finished,
        withdrawal: Withdrawal::from_classes_finished(classes_finished),
    }
}

/// Scheduled, non-cancelled sessions on or before `today`.
pub fn classes_finished(group: &ProgramGroup<'_>, today: NaiveDate) -> usize {
    program_progress(group, today).classes_finished
}

/// Final flag for a row given its group's flag.
pub fn row_withdrawal(row: &RawRow, group_withdrawal: Withdrawal) -> Withdrawal {
    if row.is_cancelled() {
        Withdrawal::Blank
    } else {
        group_withdrawal
    }
}

/// Output of one enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    /// Rows in source order (sheet order, then row order).
    pub rows: Vec<EnrichedRow>,
    /// One entry per offering, in first-encounter order.
    pub programs: Vec<ProgramProgress>,
}

/// Group rows, compute each offering's flag and attach it to every row.
pub fn enrich(rows: Vec<RawRow>, today: NaiveDate) -> Enrichment {
    let groups = group_programs(&rows);
    let programs: Vec<ProgramProgress> =
        groups.iter().map(|g| program_progress(g, today)).collect();

    let flags: HashMap<ProgramKey, Withdrawal> = groups
        .iter()
        .zip(&programs)
        .map(|(group, progress)| (group.key.clone(), progress.withdrawal))
        .collect();

    let rows = rows
        .into_iter()
        .map(|row| {
            let group_flag = flags.get(&row.key()).copied().unwrap_or(Withdrawal::Yes);
            EnrichedRow {
                withdrawal: row_withdrawal(&row, group_flag),
                row,
            }
        })
        .collect();

    Enrichment { rows, programs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(sheet: &str, range: &str, cancellations: &str) -> RawRow {
        RawRow {
            sheet: sheet.into(),
            program: "Swim".into(),
            program_id: "101".into(),
            date_range: range.into(),
            cancellation_dates: cancellations.into(),
            ..Default::default()
        }
    }

    const SEPTEMBER: &str = "01/09/2025 - 30/09/2025";

    #[test]
    fn test_parse_date_range() {
        assert_eq!(
            parse_date_range("01/09/2025 - 30/09/2025"),
            Some((date(1, 9, 2025), date(30, 9, 2025)))
        );
        assert_eq!(parse_date_range("From 01/09/2025 to 30/09/2025 (Mon)").unwrap().1, date(30, 9, 2025));
        assert_eq!(parse_date_range("not a date"), None);
        assert_eq!(parse_date_range("01/09/2025"), None);
        assert_eq!(parse_date_range("01/09/2025 - 08/09/2025 - 15/09/2025"), None);
        assert_eq!(parse_date_range("01/09/2025 - 31/02/2026"), None);
    }

    #[test]
    fn test_only_dd_mm_yyyy_accepted() {
        assert!(parse_date_tokens("2025-09-08").is_empty());
        assert!(parse_date_tokens("8/9/2025").is_empty());
        assert!(parse_date_tokens("Sept 8, 2025").is_empty());
        assert_eq!(parse_date_tokens("08/09/2025"), vec![date(8, 9, 2025)]);
    }

    #[test]
    fn test_token_boundaries() {
        assert_eq!(
            parse_date_range("01/09/2025to30/09/2025"),
            Some((date(1, 9, 2025), date(30, 9, 2025)))
        );
        // Digit runs are not split to find a token inside them
        assert!(parse_date_tokens("123/09/2025").is_empty());
        assert!(parse_date_tokens("01/09/20251").is_empty());
        assert_eq!(parse_date_range("123/09/2025 - 30/09/2025"), None);
    }

    #[test]
    fn test_non_ascii_digits_are_not_tokens() {
        let arabic = "\u{660}\u{661}/\u{660}\u{669}/\u{662}\u{660}\u{662}\u{665}";
        assert!(parse_date_tokens(arabic).is_empty());
        assert_eq!(
            parse_date_range(&format!("{} 01/09/2025 - 30/09/2025", arabic)),
            Some((date(1, 9, 2025), date(30, 9, 2025)))
        );
    }

    #[test]
    fn test_multiple_cancellation_tokens() {
        let dates = parse_date_tokens("08/09/2025, 15/09/2025 and 99/99/2025");
        assert_eq!(dates, vec![date(8, 9, 2025), date(15, 9, 2025)]);
    }

    #[test]
    fn test_scheduled_sessions_mondays() {
        let mondays: WeekdaySet = [chrono::Weekday::Mon].into_iter().collect();
        let sessions = scheduled_sessions(date(1, 9, 2025), date(30, 9, 2025), date(30, 9, 2025), mondays);
        assert_eq!(
            sessions,
            vec![date(1, 9, 2025), date(8, 9, 2025), date(15, 9, 2025), date(22, 9, 2025), date(29, 9, 2025)]
        );
    }

    #[test]
    fn test_start_after_end_is_empty() {
        let mondays: WeekdaySet = [chrono::Weekday::Mon].into_iter().collect();
        let sessions = scheduled_sessions(date(30, 9, 2025), date(1, 9, 2025), date(1, 1, 2026), mondays);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_cancelled_session_excluded() {
        let rows = vec![row("Monday", SEPTEMBER, "08/09/2025")];
        let groups = group_programs(&rows);
        let group = groups.iter().next().unwrap();

        let progress = program_progress(group, date(30, 9, 2025));
        assert_eq!(progress.scheduled_sessions, 5);
        assert_eq!(progress.cancelled_sessions, 1);
        assert_eq!(progress.classes_finished, 4);
        assert_eq!(progress.withdrawal, Withdrawal::No);
    }

    #[test]
    fn test_today_counts_as_finished() {
        let rows = vec![row("Monday", SEPTEMBER, "08/09/2025")];
        let groups = group_programs(&rows);
        let group = groups.iter().next().unwrap();

        assert_eq!(classes_finished(group, date(8, 9, 2025)), 1);
        assert_eq!(classes_finished(group, date(15, 9, 2025)), 2);

        let enriched = enrich(rows.clone(), date(8, 9, 2025));
        assert_eq!(enriched.rows[0].withdrawal, Withdrawal::Yes);
    }

    #[test]
    fn test_malformed_range_means_yes() {
        let rows = vec![row("Monday", "not a date", "")];
        let enriched = enrich(rows, date(30, 9, 2025));

        assert_eq!(enriched.programs[0].classes_finished, 0);
        assert_eq!(enriched.programs[0].start, None);
        assert_eq!(enriched.rows[0].withdrawal, Withdrawal::Yes);
    }

    #[test]
    fn test_reversed_range_means_yes() {
        let rows = vec![row("Monday", "30/09/2025 - 01/09/2025", "")];
        let enriched = enrich(rows, date(31, 10, 2025));

        let progress = &enriched.programs[0];
        assert_eq!(progress.start, Some(date(30, 9, 2025)));
        assert_eq!(progress.end, Some(date(1, 9, 2025)));
        assert_eq!(progress.scheduled_sessions, 0);
        assert_eq!(progress.classes_finished, 0);
        assert_eq!(enriched.rows[0].withdrawal, Withdrawal::Yes);
    }

    #[test]
    fn test_no_weekdays_means_zero_finished() {
        let rows = vec![row("Sheet1", SEPTEMBER, "")];
        let groups = group_programs(&rows);
        let group = groups.iter().next().unwrap();

        assert!(group.weekdays.is_empty());
        assert_eq!(classes_finished(group, date(30, 9, 2025)), 0);
    }

    #[test]
    fn test_two_weekday_sheets_three_weeks() {
        // Mon 01/09 .. Sun 21/09: three full weeks
        let range = "01/09/2025 - 21/09/2025";
        let rows = vec![row("Monday", range, ""), row("Wednesday", range, "")];
        let enriched = enrich(rows, date(30, 9, 2025));

        assert_eq!(enriched.programs.len(), 1);
        assert_eq!(enriched.programs[0].weekdays.indices(), vec![0, 2]);
        assert_eq!(enriched.programs[0].classes_finished, 6);
        assert!(enriched.rows.iter().all(|r| r.withdrawal == Withdrawal::No));
    }

    #[test]
    fn test_cancellations_deduplicated_across_rows() {
        let range = "01/09/2025 - 21/09/2025";
        let rows = vec![
            row("Monday", range, "08/09/2025"),
            row("Wednesday", range, "08/09/2025, 10/09/2025"),
        ];
        let enriched = enrich(rows, date(30, 9, 2025));

        assert_eq!(enriched.programs[0].cancelled_sessions, 2);
        assert_eq!(enriched.programs[0].classes_finished, 4);
    }

    #[test]
    fn test_cancelled_row_is_blank() {
        let mut cancelled = row("Wednesday", SEPTEMBER, "");
        cancelled.status = Status::Cancelled;
        let rows = vec![row("Monday", SEPTEMBER, ""), cancelled];

        let enriched = enrich(rows, date(30, 9, 2025));
        assert_eq!(enriched.rows[0].withdrawal, Withdrawal::No);
        assert_eq!(enriched.rows[1].withdrawal, Withdrawal::Blank);
    }

    #[test]
    fn test_rows_keep_source_order() {
        let rows = vec![
            RawRow { program_id: "1".into(), ..row("Monday", SEPTEMBER, "") },
            RawRow { program_id: "2".into(), ..row("Monday", SEPTEMBER, "") },
            RawRow { program_id: "1".into(), ..row("Wednesday", SEPTEMBER, "") },
        ];
        let enriched = enrich(rows.clone(), date(30, 9, 2025));

        let back: Vec<RawRow> = enriched.rows.into_iter().map(|r| r.row).collect();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let rows = vec![row("Monday", SEPTEMBER, "15/09/2025"), row("Thursday", SEPTEMBER, "")];
        let today = date(20, 9, 2025);
        assert_eq!(enrich(rows.clone(), today), enrich(rows, today));
    }

    #[test]
    fn test_classes_finished_monotonic_in_today() {
        let rows = vec![row("Monday", SEPTEMBER, "08/09/2025"), row("Friday", SEPTEMBER, "12/09/2025")];
        let groups = group_programs(&rows);
        let group = groups.iter().next().unwrap();

        let mut previous = 0;
        for today in date(25, 8, 2025).iter_days().take(50) {
            let finished = classes_finished(group, today);
            assert!(finished >= previous, "decreased at {}", today);
            previous = finished;
        }
    }
}
