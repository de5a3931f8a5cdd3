//! Engine wiring shared by every command that touches schedules.

use std::sync::Arc;

use timetable::config::{Config, ConfigError, Transport};
use timetable_core::{FileCache, HttpStore, PushStore, RemoteStore, SyncEngine, SyncStatus};

#[derive(Debug)]
pub enum CommandError {
    Config(ConfigError),
    UnknownTeacher(String, Vec<String>),
    InvalidArgument(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Config(e) => write!(f, "{}", e),
            CommandError::UnknownTeacher(name, roster) => write!(
                f,
                "Unknown teacher '{}'. Known teachers: {}",
                name,
                roster.join(", ")
            ),
            CommandError::InvalidArgument(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<ConfigError> for CommandError {
    fn from(e: ConfigError) -> Self {
        CommandError::Config(e)
    }
}

/// Builds the remote store the config asks for, if any.
pub fn remote_store(config: &Config) -> Option<Arc<dyn RemoteStore>> {
    let url = config.api_url.value.as_ref()?;
    let store: Arc<dyn RemoteStore> = match config.transport.value {
        Transport::Poll => {
            Arc::new(HttpStore::new(url.clone()).with_poll_interval(config.poll_interval()))
        }
        Transport::Subscribe => Arc::new(PushStore::new(url.clone())),
    };
    Some(store)
}

/// Case-insensitive roster lookup returning the roster's spelling.
pub fn find_teacher(roster: &[String], name: &str) -> Result<String, CommandError> {
    roster
        .iter()
        .find(|t| t.eq_ignore_ascii_case(name.trim()))
        .cloned()
        .ok_or_else(|| CommandError::UnknownTeacher(name.to_string(), roster.to_vec()))
}

/// A running sync engine for the duration of one command.
pub struct Session {
    pub engine: SyncEngine,
}

impl Session {
    /// Creates the engine and loads schedules (remote or cached).
    pub async fn start(config: &Config) -> Result<Self, CommandError> {
        let grid = config.grid()?;
        let cache = Arc::new(FileCache::new(config.data_dir.value.clone()));
        let engine = SyncEngine::new(
            remote_store(config),
            cache,
            grid,
            config.teachers.value.clone(),
            config.engine_options(),
        );

        let remote_ok = engine.init().await;
        tracing::debug!("Engine started (remote: {})", remote_ok);

        Ok(Self { engine })
    }

    /// Selects `name` after resolving it against the roster.
    pub fn select(&self, name: &str) -> Result<String, CommandError> {
        let teacher = find_teacher(self.engine.roster(), name)?;
        self.engine.select_teacher(&teacher);
        Ok(teacher)
    }

    /// Flushes pending edits and stops the engine, reporting where they went.
    pub async fn finish(self) {
        self.engine.shutdown().await;
        let status = self.engine.status();
        if status.status == SyncStatus::LocalOnly {
            eprintln!("Warning: saved to local storage only ({})", status.message);
        }
    }
}
