use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::day::Day;
use super::slot::{SlotKey, SlotState};

/// One teacher's weekly availability: slot key -> painted state.
///
/// Absence of a key means the slot is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schedule(BTreeMap<SlotKey, SlotState>);

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, day: Day, hour: u8) -> Option<SlotState> {
        self.0.get(&SlotKey::new(day, hour)).copied()
    }

    /// Sets a slot, removing the key when `state` is `None`.
    pub fn set(&mut self, day: Day, hour: u8, state: Option<SlotState>) {
        let key = SlotKey::new(day, hour);
        match state {
            Some(state) => {
                self.0.insert(key, state);
            }
            None => {
                self.0.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &SlotState)> {
        self.0.iter()
    }

    /// Hours on `day` painted with `state`, ascending.
    pub fn hours_with(&self, day: Day, state: SlotState) -> Vec<u8> {
        self.0
            .iter()
            .filter(|(key, s)| key.day == day && **s == state)
            .map(|(key, _)| key.hour)
            .collect()
    }

    /// Number of slots painted with `state`.
    pub fn count(&self, state: SlotState) -> usize {
        self.0.values().filter(|s| **s == state).count()
    }
}

impl FromIterator<(SlotKey, SlotState)> for Schedule {
    fn from_iter<I: IntoIterator<Item = (SlotKey, SlotState)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for Schedule {
    /// Older clients wrote cleared slots as `null`; those entries are dropped
    /// along with keys that don't parse.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Option<SlotState>>::deserialize(deserializer)?;
        let mut slots = BTreeMap::new();
        for (key, state) in raw {
            let Some(state) = state else { continue };
            match SlotKey::from_str(&key) {
                Ok(key) => {
                    slots.insert(key, state);
                }
                Err(e) => tracing::warn!("Skipping slot: {}", e),
            }
        }
        Ok(Self(slots))
    }
}

/// Every teacher's schedule. This is the unit of remote persistence: it is
/// always read and written as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleMap(BTreeMap<String, Schedule>);

impl ScheduleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, teacher: &str) -> Option<&Schedule> {
        self.0.get(teacher)
    }

    /// Returns a teacher's schedule, creating an empty one on first access.
    pub fn schedule_mut(&mut self, teacher: &str) -> &mut Schedule {
        self.0.entry(teacher.to_string()).or_default()
    }

    /// Replaces a teacher's schedule wholesale.
    pub fn insert(&mut self, teacher: impl Into<String>, schedule: Schedule) {
        self.0.insert(teacher.into(), schedule);
    }

    /// Inserts empty schedules for roster entries that are missing.
    pub fn ensure_roster<S: AsRef<str>>(&mut self, roster: &[S]) {
        for teacher in roster {
            self.schedule_mut(teacher.as_ref());
        }
    }

    /// Applies a remote snapshot: each teacher present in `remote` has their
    /// schedule replaced; teachers only known locally are left alone.
    pub fn merge_from(&mut self, remote: &ScheduleMap) {
        for (teacher, schedule) in &remote.0 {
            self.0.insert(teacher.clone(), schedule.clone());
        }
    }

    /// Whether applying `remote` would change anything.
    pub fn differs_from(&self, remote: &ScheduleMap) -> bool {
        remote
            .0
            .iter()
            .any(|(teacher, schedule)| self.0.get(teacher) != Some(schedule))
    }

    pub fn teachers(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Opaque change stamp assigned by the store on every write.
///
/// Only compared for equality; never ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }

    /// Current UTC time as an RFC 3339 timestamp with milliseconds.
    pub fn now() -> Self {
        Self(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
