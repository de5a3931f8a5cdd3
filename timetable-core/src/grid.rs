//! The weekly hour-by-day grid a schedule is painted on.

use serde::{Deserialize, Serialize};

use crate::models::{Day, SlotKey};

pub const DEFAULT_START_HOUR: u8 = 8;
pub const DEFAULT_END_HOUR: u8 = 22;

/// Hours `[start_hour, end_hour)` on every day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            start_hour: DEFAULT_START_HOUR,
            end_hour: DEFAULT_END_HOUR,
        }
    }
}

impl Grid {
    /// Creates a grid, rejecting empty or out-of-day ranges.
    pub fn new(start_hour: u8, end_hour: u8) -> Result<Self, String> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(format!(
                "Invalid hour range {}..{}: start must be below end and end at most 24",
                start_hour, end_hour
            ));
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn hours(&self) -> impl Iterator<Item = u8> {
        self.start_hour..self.end_hour
    }

    pub fn contains(&self, hour: u8) -> bool {
        (self.start_hour..self.end_hour).contains(&hour)
    }

    /// Every slot on the grid, hour-major like the rendered rows.
    pub fn slots(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.hours()
            .flat_map(|hour| Day::ALL.into_iter().map(move |day| SlotKey::new(day, hour)))
    }

    pub fn slot_count(&self) -> usize {
        (self.end_hour - self.start_hour) as usize * Day::ALL.len()
    }
}
