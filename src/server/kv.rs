//! Key-value namespace backing the schedules API.
//!
//! The file-backed namespace stores one file per key:
//! ```text
//! <KV_DIR>/
//!   all_schedules.json
//!   last_updated.json
//! ```
//!
//! Writes go through a temp file and a rename so readers never see a
//! partial value.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Key holding the serialized schedule map.
pub const SCHEDULES_KEY: &str = "all_schedules";
/// Key holding the version stamp of the last write.
pub const LAST_UPDATED_KEY: &str = "last_updated";

/// Errors that can occur reading or writing the namespace.
#[derive(Debug)]
pub enum KvError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// Key that cannot be mapped to a file name.
    InvalidKey(String),
    /// Lock poisoned by a panicking writer.
    Poisoned,
}

impl std::fmt::Display for KvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KvError::IoError(path, e) => write!(f, "I/O error for {}: {}", path.display(), e),
            KvError::InvalidKey(key) => write!(f, "Invalid key: {}", key),
            KvError::Poisoned => write!(f, "KV namespace lock poisoned"),
        }
    }
}

impl std::error::Error for KvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KvError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// String-valued key-value storage.
pub trait KvNamespace: Send + Sync {
    /// Returns `Ok(None)` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    fn put(&self, key: &str, value: &str) -> Result<(), KvError>;
}

/// Namespace stored as files in a directory.
#[derive(Debug, Clone)]
pub struct FileKv {
    dir: PathBuf,
}

impl FileKv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Rejects keys that could escape the directory.
    fn validate_key(key: &str) -> Result<(), KvError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key.contains("..")
            || key.starts_with('.')
        {
            return Err(KvError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KvNamespace for FileKv {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Self::validate_key(key)?;
        let path = self.key_path(key);

        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KvError::IoError(path, e)),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), KvError> {
        Self::validate_key(key)?;
        let path = self.key_path(key);

        fs::create_dir_all(&self.dir).map_err(|e| KvError::IoError(self.dir.clone(), e))?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");

        let mut file =
            fs::File::create(&temp_path).map_err(|e| KvError::IoError(temp_path.clone(), e))?;
        file.write_all(value.as_bytes())
            .map_err(|e| KvError::IoError(temp_path.clone(), e))?;
        file.sync_all()
            .map_err(|e| KvError::IoError(temp_path.clone(), e))?;

        fs::rename(&temp_path, &path).map_err(|e| KvError::IoError(path, e))?;

        Ok(())
    }
}

/// Namespace held in memory.
#[derive(Debug, Default)]
pub struct MemoryKv {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvNamespace for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let values = self.values.lock().map_err(|_| KvError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut values = self.values.lock().map_err(|_| KvError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
