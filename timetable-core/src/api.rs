//! JSON bodies exchanged over `/api/schedules`.
//!
//! Field names are camelCase on the wire (`lastUpdated`).

use serde::{Deserialize, Serialize};

use crate::models::{ScheduleMap, Version};

/// Path of the schedules resource.
pub const SCHEDULES_PATH: &str = "/api/schedules";
/// Path of the push subscription (WebSocket).
pub const SUBSCRIBE_PATH: &str = "/api/schedules/subscribe";

/// `GET /api/schedules` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulesResponse {
    pub success: bool,
    #[serde(default)]
    pub schedules: ScheduleMap,
    #[serde(default)]
    pub last_updated: Option<Version>,
}

/// `POST /api/schedules` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub schedules: ScheduleMap,
}

/// `POST /api/schedules` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub last_updated: Version,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body shared by every failing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// The stored document as pushed to subscribers: the full map plus its stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDocument {
    #[serde(default)]
    pub schedules: ScheduleMap,
    #[serde(default)]
    pub last_updated: Option<Version>,
}
