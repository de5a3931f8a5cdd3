//! Sync CLI commands: remote status and live watching.

use clap::Args;
use timetable::config::Config;
use timetable_core::cache::CACHE_FILENAME;
use timetable_core::{EngineEvent, SyncStatus};
use tokio::sync::broadcast::error::RecvError;

use super::session::{remote_store, CommandError, Session};

/// Show sync configuration and remote status
#[derive(Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn run(&self, config: &Config) -> Result<(), CommandError> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        match remote_store(config) {
            Some(store) => {
                println!("Remote:    {}", store.describe());
            }
            None => {
                println!("Remote:    Not configured");
                println!();
                println!("To enable sync, add to your config file:");
                println!();
                println!("  api_url: \"http://localhost:8080\"");
                println!();
                println!("Or set environment variable:");
                println!("  TIMETABLE_API_URL");
            }
        }
        println!(
            "Cache:     {}",
            config.data_dir.value.join(CACHE_FILENAME).display()
        );
        println!();

        let session = Session::start(config).await?;
        let status = session.engine.status();
        println!("Status:    {}", status);
        match session.engine.last_known_version() {
            Some(version) => println!("Version:   {}", version),
            None => println!("Version:   (never saved)"),
        }
        session.engine.dispose();

        Ok(())
    }
}

/// Follow remote changes until interrupted
#[derive(Args)]
pub struct WatchCommand {
    /// Only report changes to this teacher's schedule
    #[arg(long)]
    pub teacher: Option<String>,
}

impl WatchCommand {
    pub async fn run(&self, session: Session) -> Result<(), CommandError> {
        let teacher = match &self.teacher {
            Some(name) => Some(session.select(name)?),
            None => None,
        };
        let mut events = session.engine.subscribe();
        let mut status = session.engine.status_updates();

        println!("{}", session.engine.status());
        if session.engine.status().status == SyncStatus::LocalOnly {
            println!("Not connected to a remote store; nothing to watch.");
            session.finish().await;
            return Ok(());
        }
        println!("Watching for changes (Ctrl-C to stop)...");

        let mut last = teacher
            .as_deref()
            .map(|name| session.engine.schedule_for(name));

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(EngineEvent::RemoteApplied { version }) => {
                        let version = version.map(|v| v.to_string()).unwrap_or_default();
                        match teacher.as_deref() {
                            Some(name) => {
                                let current = session.engine.schedule_for(name);
                                if last.as_ref() != Some(&current) {
                                    println!("{} changed ({} painted slot(s)) {}", name, current.len(), version);
                                    last = Some(current);
                                }
                            }
                            None => println!("Updated from cloud {}", version),
                        }
                    }
                    Ok(EngineEvent::Saved { version }) => println!("Saved {}", version),
                    Ok(EngineEvent::SaveFailed { reason }) => println!("Save failed: {}", reason),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Missed {} engine event(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let report = status.borrow_and_update().clone();
                    tracing::info!("{}", report);
                },
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            }
        }

        session.finish().await;
        Ok(())
    }
}
