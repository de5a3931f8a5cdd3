//! In-process remote store.
//!
//! Behaves like a push backend: every write, including the caller's own, is
//! delivered to open watchers. Failures and slow saves can be injected.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;

use super::{RemoteSnapshot, RemoteStore, SnapshotStream, StoreError};
use crate::models::{ScheduleMap, Version};

#[derive(Debug, Default)]
struct MemoryState {
    schedules: ScheduleMap,
    version: Option<Version>,
    counter: u64,
    failure: Option<StoreError>,
    save_delay: Option<Duration>,
    saves: Vec<ScheduleMap>,
}

/// Remote store kept in memory.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    updates: broadcast::Sender<RemoteSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(MemoryState::default()),
            updates,
        }
    }

    /// Creates a store that already holds `schedules` at version `v1`.
    pub fn with_schedules(schedules: ScheduleMap) -> Self {
        let store = Self::new();
        store.put_external(schedules);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every following call fail with `error` until cleared.
    pub fn set_failure(&self, error: Option<StoreError>) {
        self.lock().failure = error;
    }

    /// Delays every save by `delay` before it is applied.
    pub fn set_save_delay(&self, delay: Option<Duration>) {
        self.lock().save_delay = delay;
    }

    /// Every map written through `save_all`, oldest first.
    pub fn saves(&self) -> Vec<ScheduleMap> {
        self.lock().saves.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves.len()
    }

    /// Current contents and version.
    pub fn snapshot(&self) -> RemoteSnapshot {
        let state = self.lock();
        RemoteSnapshot {
            schedules: state.schedules.clone(),
            version: state.version.clone(),
        }
    }

    /// Writes as another device would, notifying watchers.
    pub fn put_external(&self, schedules: ScheduleMap) -> Version {
        self.commit(Some(schedules), false)
    }

    /// Re-stamps the stored data without changing it and notifies watchers.
    pub fn touch(&self) -> Version {
        self.commit(None, false)
    }

    /// Applies a write under a fresh version and pushes it to watchers.
    fn commit(&self, schedules: Option<ScheduleMap>, record_save: bool) -> Version {
        let (version, snapshot) = {
            let mut state = self.lock();
            state.counter += 1;
            let version = Version::new(format!("v{}", state.counter));
            state.version = Some(version.clone());
            if let Some(schedules) = schedules {
                if record_save {
                    state.saves.push(schedules.clone());
                }
                state.schedules = schedules;
            }
            let snapshot = RemoteSnapshot {
                schedules: state.schedules.clone(),
                version: Some(version.clone()),
            };
            (version, snapshot)
        };
        // No watchers is fine
        let _ = self.updates.send(snapshot);
        version
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        match &self.lock().failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_all(&self) -> Result<RemoteSnapshot, StoreError> {
        self.check_failure()?;
        Ok(self.snapshot())
    }

    async fn save_all(&self, schedules: &ScheduleMap) -> Result<Version, StoreError> {
        let delay = self.lock().save_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure()?;

        Ok(self.commit(Some(schedules.clone()), true))
    }

    async fn watch(&self) -> Result<SnapshotStream, StoreError> {
        self.check_failure()?;
        let rx = self.updates.subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => return Some((Ok(snapshot), rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Day, SlotState};

    fn sample() -> ScheduleMap {
        let mut map = ScheduleMap::new();
        map.schedule_mut("Alice")
            .set(Day::Monday, 8, Some(SlotState::Available));
        map
    }

    #[tokio::test]
    async fn test_empty_store_has_no_version() {
        let store = MemoryStore::new();
        let snapshot = store.fetch_all().await.unwrap();
        assert!(snapshot.schedules.is_empty());
        assert!(snapshot.version.is_none());
    }

    #[tokio::test]
    async fn test_save_assigns_new_version() {
        let store = MemoryStore::new();
        let v1 = store.save_all(&sample()).await.unwrap();
        let v2 = store.save_all(&sample()).await.unwrap();

        assert_ne!(v1, v2);
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.fetch_all().await.unwrap().version, Some(v2));
    }

    #[tokio::test]
    async fn test_watch_receives_writes() {
        let store = MemoryStore::new();
        let mut stream = store.watch().await.unwrap();

        store.put_external(sample());

        let snapshot = stream.next().await.unwrap().unwrap();
        assert_eq!(snapshot.schedules, sample());
        assert_eq!(snapshot.version, Some(Version::new("v1")));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.set_failure(Some(StoreError::Unreachable("down".to_string())));

        assert!(store.fetch_all().await.is_err());
        assert!(store.save_all(&sample()).await.is_err());
        assert_eq!(store.save_count(), 0);

        store.set_failure(None);
        assert!(store.fetch_all().await.is_ok());
    }

    #[tokio::test]
    async fn test_touch_keeps_data() {
        let store = MemoryStore::with_schedules(sample());
        let before = store.snapshot();
        let version = store.touch();

        let after = store.snapshot();
        assert_eq!(after.schedules, before.schedules);
        assert_ne!(after.version, before.version);
        assert_eq!(after.version, Some(version));
    }
}
