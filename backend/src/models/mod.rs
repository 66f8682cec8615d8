//! Domain models for the cancellations pipeline.
//!
//! - [`RawRow`] - One program line extracted from a weekday sheet
//! - [`ProgramKey`] - `(program_id, date_range)` identity of an offering
//! - [`WeekdaySet`] - Weekdays an offering meets on
//! - [`Withdrawal`] - Derived `Yes` / `No` / blank flag
//! - [`EnrichedRow`] - A raw row plus its withdrawal flag
//! - [`ProgramProgress`] - Per-offering view of the withdrawal computation

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Status
// =============================================================================

/// Whether a row's program is running or has been cancelled outright.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Active,
    Cancelled,
}

impl Status {
    /// Interpret the sheet's "actions" checkbox. Only a literal `TRUE` cancels.
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim().eq_ignore_ascii_case("true") {
            Status::Cancelled
        } else {
            Status::Active
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "Active",
            Status::Cancelled => "Cancelled",
        }
    }
}

// =============================================================================
// Weekdays
// =============================================================================

/// Weekday names in index order, `0 = Monday`.
pub const WEEKDAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Set of weekdays, stored as a bitmask over `0 = Monday .. 6 = Sunday`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_monday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn union(self, other: WeekdaySet) -> WeekdaySet {
        WeekdaySet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Ascending weekday indices.
    pub fn indices(&self) -> Vec<u32> {
        (0..7u32).filter(|i| self.0 & (1u8 << *i) != 0).collect()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::new();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.indices().serialize(serializer)
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One program line as it appears on a weekday sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RawRow {
    /// Name of the sheet the row came from (carries the weekday).
    pub sheet: String,
    pub program: String,
    pub program_id: String,
    /// Free text such as `01/09/2025 - 30/09/2025`.
    pub date_range: String,
    pub time: String,
    pub location: String,
    pub class_room: String,
    pub instructor: String,
    pub status: Status,
    /// Free text, may list several `DD/MM/YYYY` dates.
    pub cancellation_dates: String,
    pub note: String,
}

impl RawRow {
    pub fn key(&self) -> ProgramKey {
        ProgramKey {
            program_id: self.program_id.clone(),
            date_range: self.date_range.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == Status::Cancelled
    }

    pub fn has_cancellation(&self) -> bool {
        !self.cancellation_dates.trim().is_empty()
    }
}

/// Identity of one program offering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProgramKey {
    pub program_id: String,
    pub date_range: String,
}

// =============================================================================
// Withdrawal
// =============================================================================

/// Withdrawal eligibility shown next to each row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Withdrawal {
    Yes,
    No,
    /// Cancelled programs show no withdrawal status.
    #[serde(rename = "")]
    Blank,
}

impl Withdrawal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Withdrawal::Yes => "Yes",
            Withdrawal::No => "No",
            Withdrawal::Blank => "",
        }
    }
}

/// A raw row plus its computed withdrawal flag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnrichedRow {
    #[serde(flatten)]
    pub row: RawRow,
    pub withdrawal: Withdrawal,
}

/// How the withdrawal flag of one offering was derived.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProgramProgress {
    pub program_id: String,
    pub date_range: String,
    pub program: String,
    pub sheets: Vec<String>,
    pub weekdays: WeekdaySet,
    /// `None` when the date range did not hold exactly two dates.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Sessions on or before today, cancelled ones included.
    pub scheduled_sessions: usize,
    pub cancelled_sessions: usize,
    pub classes_finished: usize,
    pub withdrawal: Withdrawal,
}
