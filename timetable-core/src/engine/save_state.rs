//! Outbound save scheduling as an explicit state machine.

use std::fmt;

/// Where the engine is in the edit -> debounce -> save cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveState {
    /// Nothing pending.
    #[default]
    Idle,
    /// Edits are waiting for the debounce timer.
    Debouncing,
    /// A save is in flight.
    Saving,
    /// A save is in flight and newer edits arrived after it started.
    SavingWithPendingEdit,
}

/// Inputs that move a [`SaveState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEvent {
    /// A local edit was flushed into the schedule map.
    Edit,
    /// The debounce timer expired, or an explicit save was requested.
    TimerFired,
    /// The store acknowledged the save.
    SaveAcked,
    /// The save failed.
    SaveFailed,
}

impl SaveState {
    /// Applies one event. Combinations not listed leave the state unchanged;
    /// in particular a second save never starts while one is in flight.
    pub fn on(self, event: SaveEvent) -> SaveState {
        use SaveEvent::*;
        use SaveState::*;

        match (self, event) {
            (Idle, Edit) | (Debouncing, Edit) => Debouncing,
            (Saving, Edit) | (SavingWithPendingEdit, Edit) => SavingWithPendingEdit,

            (Idle, TimerFired) | (Debouncing, TimerFired) => Saving,

            (Saving, SaveAcked) | (Saving, SaveFailed) => Idle,
            (SavingWithPendingEdit, SaveAcked) | (SavingWithPendingEdit, SaveFailed) => Debouncing,

            (state, _) => state,
        }
    }

    /// Whether local edits exist that the store has not acknowledged.
    pub fn has_pending_edits(self) -> bool {
        !matches!(self, SaveState::Idle | SaveState::Saving)
    }

    /// Whether a save is in flight.
    pub fn is_saving(self) -> bool {
        matches!(self, SaveState::Saving | SaveState::SavingWithPendingEdit)
    }
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveState::Idle => write!(f, "idle"),
            SaveState::Debouncing => write!(f, "debouncing"),
            SaveState::Saving => write!(f, "saving"),
            SaveState::SavingWithPendingEdit => write!(f, "saving (edits pending)"),
        }
    }
}
