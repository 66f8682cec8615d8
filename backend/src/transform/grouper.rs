//! Group weekday rows into program offerings.
//!
//! A program meeting Monday and Wednesday appears once on each weekday sheet.
//! Rows sharing a [`ProgramKey`] are merged and their weekdays unioned.
//!
//! ```text
//! Sheet rows                            Offerings
//! ┌────────────────────────────┐        ┌───────────────────────────┐
//! │ Monday    │ 101 │ Sep 2025 │        │ 101 / Sep 2025  {Mon,Wed} │
//! │ Wednesday │ 101 │ Sep 2025 │   →    ├───────────────────────────┤
//! │ Monday    │ 102 │ Sep 2025 │        │ 102 / Sep 2025  {Mon}     │
//! └────────────────────────────┘        └───────────────────────────┘
//! ```

use chrono::Weekday;
use std::collections::HashMap;

use crate::models::{ProgramKey, RawRow, WeekdaySet, WEEKDAY_NAMES};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Weekdays named anywhere in a sheet label (case-insensitive substring).
///
/// A label that mentions a weekday for another reason, e.g. "Friday Night
/// Lights - Tuesday", yields both days.
pub fn weekdays_in_label(label: &str) -> WeekdaySet {
    let label = label.to_lowercase();
    WEEKDAY_NAMES
        .iter()
        .zip(WEEKDAYS)
        .filter_map(|(name, day)| label.contains(*name).then_some(day))
        .collect()
}

/// Rows of one offering, in encounter order.
#[derive(Debug, Clone)]
pub struct ProgramGroup<'a> {
    pub key: ProgramKey,
    pub rows: Vec<&'a RawRow>,
    pub weekdays: WeekdaySet,
}

impl<'a> ProgramGroup<'a> {
    fn new(key: ProgramKey) -> Self {
        Self {
            key,
            rows: Vec::new(),
            weekdays: WeekdaySet::new(),
        }
    }

    fn push(&mut self, row: &'a RawRow) {
        self.weekdays = self.weekdays.union(weekdays_in_label(&row.sheet));
        self.rows.push(row);
    }

    /// First non-empty program name in the group.
    pub fn program(&self) -> &str {
        self.rows
            .iter()
            .map(|r| r.program.as_str())
            .find(|p| !p.is_empty())
            .unwrap_or("")
    }

    /// Distinct sheet names, in encounter order.
    pub fn sheets(&self) -> Vec<String> {
        let mut sheets: Vec<String> = Vec::new();
        for row in &self.rows {
            if !sheets.contains(&row.sheet) {
                sheets.push(row.sheet.clone());
            }
        }
        sheets
    }
}

/// Insertion-ordered map from [`ProgramKey`] to [`ProgramGroup`].
#[derive(Debug, Clone, Default)]
pub struct ProgramGroups<'a> {
    groups: Vec<ProgramGroup<'a>>,
    index: HashMap<ProgramKey, usize>,
}

impl<'a> ProgramGroups<'a> {
    pub fn get(&self, key: &ProgramKey) -> Option<&ProgramGroup<'a>> {
        self.index.get(key).map(|&i| &self.groups[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramGroup<'a>> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Single pass over the rows, grouping by `(program_id, date_range)`.
pub fn group_programs(rows: &[RawRow]) -> ProgramGroups<'_> {
    let mut groups: ProgramGroups = ProgramGroups::default();

    for row in rows {
        let key = row.key();
        let idx = match groups.index.get(&key) {
            Some(&idx) => idx,
            None => {
                groups.groups.push(ProgramGroup::new(key.clone()));
                groups.index.insert(key, groups.groups.len() - 1);
                groups.groups.len() - 1
            }
        };
        groups.groups[idx].push(row);
    }

    groups
}
