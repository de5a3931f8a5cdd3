//! Local fallback storage for the schedule map.
//!
//! Holds the last known map so edits survive when the remote store is
//! unreachable or unconfigured. Failures are logged and otherwise ignored:
//! a cache that can't be read is treated as empty.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::ScheduleMap;

/// File name of the cached map inside the data directory.
pub const CACHE_FILENAME: &str = "timetable_schedules.json";

/// On-device copy of the last known schedule map.
pub trait LocalCache: Send + Sync {
    /// Returns the cached map, or `None` if nothing usable is stored.
    fn load(&self) -> Option<ScheduleMap>;

    /// Replaces the cached map.
    fn save(&self, schedules: &ScheduleMap);
}

/// Cache stored as one JSON file, written wholesale.
#[derive(Debug, Clone)]
pub struct FileCache {
    data_dir: PathBuf,
}

impl FileCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILENAME)
    }

    fn try_save(&self, schedules: &ScheduleMap) -> io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;

        let path = self.path();
        let json = serde_json::to_vec_pretty(schedules).map_err(io::Error::other)?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &path)
    }
}

fn read_map(path: &Path) -> Option<ScheduleMap> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("Failed to read cache {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(map) => Some(map),
        Err(e) => {
            tracing::warn!("Ignoring corrupt cache {}: {}", path.display(), e);
            None
        }
    }
}

impl LocalCache for FileCache {
    fn load(&self) -> Option<ScheduleMap> {
        read_map(&self.path())
    }

    fn save(&self, schedules: &ScheduleMap) {
        if let Err(e) = self.try_save(schedules) {
            tracing::warn!("Failed to write cache {}: {}", self.path().display(), e);
        }
    }
}

/// Cache held in memory.
#[derive(Debug, Default)]
pub struct MemoryCache {
    map: Mutex<Option<ScheduleMap>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schedules(schedules: ScheduleMap) -> Self {
        Self {
            map: Mutex::new(Some(schedules)),
        }
    }
}

impl LocalCache for MemoryCache {
    fn load(&self) -> Option<ScheduleMap> {
        self.map.lock().ok().and_then(|map| map.clone())
    }

    fn save(&self, schedules: &ScheduleMap) {
        if let Ok(mut map) = self.map.lock() {
            *map = Some(schedules.clone());
        }
    }
}
