mod config_cmd;
mod schedule;
mod session;
mod sync_cmd;

pub use config_cmd::ConfigCommand;
pub use schedule::{
    ClearCommand, CycleCommand, FillCommand, SetCommand, ShowCommand, TeachersCommand,
};
pub use session::Session;
pub use sync_cmd::{StatusCommand, WatchCommand};
