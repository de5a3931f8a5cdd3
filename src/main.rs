use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{
    ClearCommand, ConfigCommand, CycleCommand, FillCommand, Session, SetCommand, ShowCommand,
    StatusCommand, TeachersCommand, WatchCommand,
};
use timetable::config::Config;

#[derive(Parser)]
#[command(name = "timetable")]
#[command(version)]
#[command(about = "Teacher availability timetable with cloud sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List teachers
    Teachers(TeachersCommand),

    /// Show a teacher's schedule
    Show(ShowCommand),

    /// Set one slot
    Set(SetCommand),

    /// Cycle one slot through none, available and unavailable
    Cycle(CycleCommand),

    /// Paint every slot for a teacher
    Fill(FillCommand),

    /// Clear every slot for a teacher
    Clear(ClearCommand),

    /// Show sync configuration and remote status
    Status(StatusCommand),

    /// Follow remote changes until interrupted
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Teachers(cmd)) => cmd.run(Session::start(&config).await?).await?,
        Some(Commands::Show(cmd)) => cmd.run(Session::start(&config).await?).await?,
        Some(Commands::Set(cmd)) => cmd.run(Session::start(&config).await?).await?,
        Some(Commands::Cycle(cmd)) => cmd.run(Session::start(&config).await?).await?,
        Some(Commands::Fill(cmd)) => cmd.run(Session::start(&config).await?).await?,
        Some(Commands::Clear(cmd)) => cmd.run(Session::start(&config).await?).await?,
        Some(Commands::Status(cmd)) => cmd.run(&config).await?,
        Some(Commands::Watch(cmd)) => cmd.run(Session::start(&config).await?).await?,
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
