//! Timetable application library: CLI configuration and the schedules server.

pub mod config;
pub mod server;
