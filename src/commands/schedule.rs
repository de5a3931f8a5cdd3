//! Commands that read and paint teacher schedules.

use clap::Args;
use timetable_core::summary::{format_hour, summarize_all};
use timetable_core::{Day, Grid, Schedule, SlotState};

use super::session::{CommandError, Session};

/// Single-character cell used by the grid printout.
fn symbol(state: Option<SlotState>) -> char {
    match state {
        None => '.',
        Some(SlotState::Available) => 'A',
        Some(SlotState::Unavailable) => 'U',
        Some(SlotState::Navy) => 'N',
        Some(SlotState::Cyan) => 'C',
        Some(SlotState::Magenta) => 'M',
        Some(SlotState::Salmon) => 'S',
    }
}

/// Renders the week grid, one row per hour.
pub fn render_grid(schedule: &Schedule, grid: &Grid) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>9}", ""));
    for day in Day::ALL {
        out.push_str(&format!(" {:>4}", day.short_name()));
    }
    out.push('\n');

    for hour in grid.hours() {
        out.push_str(&format!("{:>9}", format_hour(u16::from(hour))));
        for day in Day::ALL {
            out.push_str(&format!(" {:>4}", symbol(schedule.get(day, hour))));
        }
        out.push('\n');
    }
    out
}

/// Renders the per-state range summary.
pub fn render_summary(schedule: &Schedule, grid: &Grid) -> String {
    let groups = summarize_all(schedule, grid);
    if groups.is_empty() {
        return "No slots painted.\n".to_string();
    }

    let mut out = String::new();
    for (state, days) in groups {
        out.push_str(&format!("{} [{}]\n", state.label(), symbol(Some(state))));
        for day in days {
            out.push_str(&format!("  {}\n", day));
        }
    }
    out
}

fn check_hour(grid: &Grid, hour: u8) -> Result<(), CommandError> {
    if grid.contains(hour) {
        Ok(())
    } else {
        Err(CommandError::InvalidArgument(format!(
            "Hour {} is outside the grid ({} to {})",
            hour,
            grid.start_hour,
            grid.end_hour - 1
        )))
    }
}

/// List teachers and how many slots each has painted
#[derive(Args)]
pub struct TeachersCommand {}

impl TeachersCommand {
    pub async fn run(&self, session: Session) -> Result<(), CommandError> {
        let map = session.engine.schedule_map();
        for teacher in session.engine.roster() {
            let painted = map.get(teacher).map(Schedule::len).unwrap_or(0);
            println!("{:<12} {:>3} slot(s)", teacher, painted);
        }
        println!("\nTotal: {} teacher(s)", session.engine.roster().len());
        session.finish().await;
        Ok(())
    }
}

/// Show a teacher's week grid and availability summary
#[derive(Args)]
pub struct ShowCommand {
    /// Teacher name
    pub teacher: String,
}

impl ShowCommand {
    pub async fn run(&self, session: Session) -> Result<(), CommandError> {
        let teacher = session.select(&self.teacher)?;
        let schedule = session.engine.working_schedule();
        let grid = session.engine.grid();

        println!("{}", teacher);
        println!("{}\n", "=".repeat(teacher.len()));
        print!("{}", render_grid(&schedule, &grid));
        println!();
        print!("{}", render_summary(&schedule, &grid));

        session.finish().await;
        Ok(())
    }
}

/// Set one slot to a state (or `none` to clear it)
#[derive(Args)]
pub struct SetCommand {
    /// Teacher name
    pub teacher: String,
    /// Day of the week (e.g. monday, mon)
    pub day: Day,
    /// Hour of the day, 24-hour clock
    pub hour: u8,
    /// available, unavailable, navy, cyan, magenta, salmon or none
    pub state: String,
}

impl SetCommand {
    pub async fn run(&self, session: Session) -> Result<(), CommandError> {
        let state = SlotState::parse_optional(&self.state).map_err(CommandError::InvalidArgument)?;
        check_hour(&session.engine.grid(), self.hour)?;
        let teacher = session.select(&self.teacher)?;

        session.engine.set_slot(self.day, self.hour, state);
        println!(
            "{} {} {}: {}",
            teacher,
            self.day,
            format_hour(u16::from(self.hour)),
            state.map(|s| s.label()).unwrap_or("(empty)")
        );

        session.finish().await;
        Ok(())
    }
}

/// Advance a slot through none, available and unavailable
#[derive(Args)]
pub struct CycleCommand {
    /// Teacher name
    pub teacher: String,
    /// Day of the week (e.g. monday, mon)
    pub day: Day,
    /// Hour of the day, 24-hour clock
    pub hour: u8,
}

impl CycleCommand {
    pub async fn run(&self, session: Session) -> Result<(), CommandError> {
        check_hour(&session.engine.grid(), self.hour)?;
        let teacher = session.select(&self.teacher)?;

        session.engine.cycle_slot(self.day, self.hour);
        let state = session.engine.slot(self.day, self.hour);
        println!(
            "{} {} {}: {}",
            teacher,
            self.day,
            format_hour(u16::from(self.hour)),
            state.map(|s| s.label()).unwrap_or("(empty)")
        );

        session.finish().await;
        Ok(())
    }
}

/// Paint every slot of a teacher's grid
#[derive(Args)]
pub struct FillCommand {
    /// Teacher name
    pub teacher: String,
    /// State to paint (default: available)
    pub state: Option<SlotState>,
}

impl FillCommand {
    pub async fn run(&self, session: Session) -> Result<(), CommandError> {
        let teacher = session.select(&self.teacher)?;
        let state = self.state.unwrap_or(SlotState::Available);

        session.engine.bulk_set(Some(state));
        println!(
            "{}: {} slot(s) set to {}",
            teacher,
            session.engine.grid().slot_count(),
            state.label()
        );

        session.finish().await;
        Ok(())
    }
}

/// Clear every slot of a teacher's grid
#[derive(Args)]
pub struct ClearCommand {
    /// Teacher name
    pub teacher: String,
}

impl ClearCommand {
    pub async fn run(&self, session: Session) -> Result<(), CommandError> {
        let teacher = session.select(&self.teacher)?;

        session.engine.clear_all();
        println!("{}: all slots cleared", teacher);

        session.finish().await;
        Ok(())
    }
}
