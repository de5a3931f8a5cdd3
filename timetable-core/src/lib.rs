//! Timetable Core Library
//!
//! Schedule model, remote store adapters, local cache and the sync engine
//! shared by the timetable CLI and server.

pub mod api;
pub mod cache;
pub mod engine;
pub mod grid;
pub mod models;
pub mod store;
pub mod summary;

pub use cache::{FileCache, LocalCache, MemoryCache};
pub use engine::{
    EngineEvent, EngineOptions, ReconcileOutcome, SaveState, StatusReport, SyncEngine, SyncStatus,
};
pub use grid::Grid;
pub use models::{Day, Schedule, ScheduleMap, SlotKey, SlotState, Version};
pub use store::{HttpStore, MemoryStore, PushStore, RemoteSnapshot, RemoteStore, StoreError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
