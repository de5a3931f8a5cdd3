//! Remote store adapters.
//!
//! A remote store holds the whole [`ScheduleMap`] as one document. Two
//! transports implement the same contract:
//!
//! - [`HttpStore`] polls `GET /api/schedules` on a fixed interval.
//! - [`PushStore`] seeds with one read and then receives every change over a
//!   WebSocket subscription.
//!
//! Either way, changes surface as a [`SnapshotStream`] that the sync engine
//! feeds through its reconciliation path.

mod error;
mod http;
mod memory;
mod push;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::{ScheduleMap, Version};

pub use error::StoreError;
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use push::PushStore;

/// A full copy of the remote document.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshot {
    pub schedules: ScheduleMap,
    /// `None` when the store has never been written.
    pub version: Option<Version>,
}

/// Remote changes, one full snapshot per item.
pub type SnapshotStream = BoxStream<'static, Result<RemoteSnapshot, StoreError>>;

/// Contract the sync engine expects from a backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the whole document.
    async fn fetch_all(&self) -> Result<RemoteSnapshot, StoreError>;

    /// Overwrites the whole document and returns the new version.
    async fn save_all(&self, schedules: &ScheduleMap) -> Result<Version, StoreError>;

    /// Opens a stream of remote snapshots. The stream ends when the
    /// underlying transport closes; callers may open a new one.
    async fn watch(&self) -> Result<SnapshotStream, StoreError>;

    /// Short description for status output, e.g. `poll http://host`.
    fn describe(&self) -> String;
}
