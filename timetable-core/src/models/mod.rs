mod day;
mod schedule;
mod slot;

pub use day::Day;
pub use schedule::{Schedule, ScheduleMap, Version};
pub use slot::{SlotKey, SlotState};
