//! Server-side modules for the timetable schedules API.

pub mod api;
pub mod config;
pub mod hub;
pub mod kv;

pub use api::build_router;
pub use config::{ServerConfig, ServerConfigError};
pub use hub::ScheduleHub;
pub use kv::{FileKv, KvError, KvNamespace, MemoryKv};
