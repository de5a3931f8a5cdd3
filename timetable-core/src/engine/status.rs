//! Sync status and engine events for the UI layer.

use std::fmt;

use serde::Serialize;

use crate::models::Version;

/// Coarse sync status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Syncing,
    Synced,
    /// Edits still work but only reach the local cache.
    LocalOnly,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::LocalOnly => write!(f, "local-only"),
        }
    }
}

/// Status plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: SyncStatus,
    pub message: String,
}

impl StatusReport {
    pub fn new(status: SyncStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A foreign change was merged; views of the schedule should refresh.
    RemoteApplied { version: Option<Version> },
    /// The store acknowledged a save.
    Saved { version: Version },
    /// A save failed; edits were kept locally.
    SaveFailed { reason: String },
}

/// What a remote delivery did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The delivery carried new data and was merged.
    Applied,
    /// Only the version changed; the stamp was recorded.
    VersionOnly,
    /// Same version as last seen.
    Unchanged,
    /// Deferred because local edits are unsaved or the engine just wrote.
    Suppressed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SyncStatus::LocalOnly.to_string(), "local-only");
        let report = StatusReport::new(SyncStatus::Synced, "Cloud sync active");
        assert_eq!(report.to_string(), "[synced] Cloud sync active");
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&SyncStatus::LocalOnly).unwrap();
        assert_eq!(json, "\"local-only\"");
    }
}
