use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::day::Day;

/// Category painted on a slot. An empty slot is `None` at the use site and is
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Available,
    Unavailable,
    Navy,
    Cyan,
    Magenta,
    Salmon,
}

impl SlotState {
    /// Every state, in the order summaries list them.
    pub const ALL: [SlotState; 6] = [
        SlotState::Available,
        SlotState::Unavailable,
        SlotState::Navy,
        SlotState::Cyan,
        SlotState::Magenta,
        SlotState::Salmon,
    ];

    /// Wire name, as stored in the schedule map.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Available => "available",
            SlotState::Unavailable => "unavailable",
            SlotState::Navy => "navy",
            SlotState::Cyan => "cyan",
            SlotState::Magenta => "magenta",
            SlotState::Salmon => "salmon",
        }
    }

    /// Human-readable category label.
    pub fn label(&self) -> &'static str {
        match self {
            SlotState::Available => "Available",
            SlotState::Unavailable => "Unavailable",
            SlotState::Navy => "Home Teachers",
            SlotState::Cyan => "Home Teachers (extra)",
            SlotState::Magenta => "SpeakOn",
            SlotState::Salmon => "SpeakOn (extra)",
        }
    }

    /// Advances a slot through the left-click cycle
    /// `none -> available -> unavailable -> none`.
    ///
    /// Color categories are outside the cycle; cycling one clears the slot.
    pub fn cycle(current: Option<SlotState>) -> Option<SlotState> {
        match current {
            None => Some(SlotState::Available),
            Some(SlotState::Available) => Some(SlotState::Unavailable),
            Some(_) => None,
        }
    }

    /// Parses a state name, accepting `none`/`clear` as the empty slot.
    pub fn parse_optional(s: &str) -> Result<Option<SlotState>, String> {
        match s.to_lowercase().as_str() {
            "none" | "clear" => Ok(None),
            other => SlotState::from_str(other).map(Some),
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SlotState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(SlotState::Available),
            "unavailable" => Ok(SlotState::Unavailable),
            "navy" => Ok(SlotState::Navy),
            "cyan" => Ok(SlotState::Cyan),
            "magenta" => Ok(SlotState::Magenta),
            "salmon" => Ok(SlotState::Salmon),
            _ => Err(format!(
                "Invalid state '{}'. Valid options: available, unavailable, navy, cyan, magenta, salmon, none",
                s
            )),
        }
    }
}

/// One (day, hour) cell of the weekly grid.
///
/// Encoded canonically as `"<Day>-<Hour>"`, e.g. `"Monday-8"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub day: Day,
    pub hour: u8,
}

impl SlotKey {
    pub fn new(day: Day, hour: u8) -> Self {
        Self { day, hour }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day.name(), self.hour)
    }
}

impl FromStr for SlotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day, hour) = s
            .rsplit_once('-')
            .ok_or_else(|| format!("Invalid slot key '{}': expected <Day>-<Hour>", s))?;
        let day = Day::from_str(day)?;
        let hour = hour
            .parse::<u8>()
            .map_err(|_| format!("Invalid slot key '{}': hour must be 0-23", s))?;
        if hour > 23 {
            return Err(format!("Invalid slot key '{}': hour must be 0-23", s));
        }
        Ok(Self { day, hour })
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SlotKey::from_str(&s).map_err(serde::de::Error::custom)
    }
}
