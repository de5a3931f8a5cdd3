//! Availability summaries: painted hours collapsed into readable ranges.

use std::fmt;

use crate::grid::Grid;
use crate::models::{Day, Schedule, SlotState};

/// A run of consecutive hours, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourRange {
    pub start: u8,
    pub end: u8,
}

impl fmt::Display for HourRange {
    /// A single hour shows on its own; a run shows its end as `end + 1`
    /// (the hour the block finishes).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", format_hour(u16::from(self.start)))
        } else {
            write!(
                f,
                "{} - {}",
                format_hour(u16::from(self.start)),
                format_hour(u16::from(self.end) + 1)
            )
        }
    }
}

/// Formats an hour on a 12-hour clock, e.g. `8` -> `"8:00 AM"`, `13` -> `"1:00 PM"`.
///
/// Takes `u16` so the exclusive end of a run ending at hour 255 still fits.
/// Hour 24 (the end of a run reaching midnight) reads `"12:00 PM"`.
pub fn format_hour(hour: u16) -> String {
    let period = if hour >= 12 { "PM" } else { "AM" };
    let display = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    format!("{}:00 {}", display, period)
}

/// Groups hours into runs of consecutive values.
pub fn group_consecutive_hours(hours: &[u8]) -> Vec<HourRange> {
    let mut sorted = hours.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<HourRange> = Vec::new();
    for hour in sorted {
        match ranges.last_mut() {
            Some(range) if range.end.checked_add(1) == Some(hour) => range.end = hour,
            _ => ranges.push(HourRange {
                start: hour,
                end: hour,
            }),
        }
    }
    ranges
}

/// Ranges painted with one state on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub day: Day,
    pub ranges: Vec<HourRange>,
}

impl fmt::Display for DaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}: {}", self.day, ranges.join(", "))
    }
}

/// All days that have at least one hour painted with `state`, Sunday first.
pub fn summarize(schedule: &Schedule, grid: &Grid, state: SlotState) -> Vec<DaySummary> {
    Day::ALL
        .into_iter()
        .filter_map(|day| {
            let hours: Vec<u8> = schedule
                .hours_with(day, state)
                .into_iter()
                .filter(|h| grid.contains(*h))
                .collect();
            if hours.is_empty() {
                None
            } else {
                Some(DaySummary {
                    day,
                    ranges: group_consecutive_hours(&hours),
                })
            }
        })
        .collect()
}

/// Per-state summaries in label order, skipping states with no hours.
pub fn summarize_all(schedule: &Schedule, grid: &Grid) -> Vec<(SlotState, Vec<DaySummary>)> {
    SlotState::ALL
        .into_iter()
        .map(|state| (state, summarize(schedule, grid, state)))
        .filter(|(_, days)| !days.is_empty())
        .collect()
}
