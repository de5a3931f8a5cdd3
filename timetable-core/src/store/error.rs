//! Remote store error types.

/// Errors a remote store can report.
///
/// None of these reach the UI layer: the sync engine turns them into a
/// local-only status and keeps working against the local cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend binding is absent. Terminal for the call.
    #[error("Remote store not configured: {0}")]
    Unconfigured(String),
    /// The store could not be reached. Retried on the next cycle.
    #[error("Remote store unreachable: {0}")]
    Unreachable(String),
    /// The store answered with an unexpected status.
    #[error("Server returned status {status}: {message}")]
    Http { status: u16, message: String },
    /// A write was rejected for missing or malformed data.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// The store failed internally.
    #[error("Internal store error: {0}")]
    Internal(String),
    /// The response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// A push subscription failed or dropped.
    #[error("Subscription error: {0}")]
    Subscription(String),
}

impl StoreError {
    /// Whether retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unreachable(_) | StoreError::Subscription(_) | StoreError::Http { .. }
        )
    }

    /// Short reason shown next to the local-only status.
    pub fn status_reason(&self) -> String {
        match self {
            StoreError::Unconfigured(_) => "KV not configured - check server settings".to_string(),
            StoreError::Unreachable(_) => "Offline mode (local storage only)".to_string(),
            StoreError::Http { status: 404, .. } => {
                "API not found - check server path".to_string()
            }
            StoreError::Http { message, .. } => message.clone(),
            StoreError::BadRequest(e)
            | StoreError::Internal(e)
            | StoreError::Decode(e)
            | StoreError::Subscription(e) => e.clone(),
        }
    }
}
