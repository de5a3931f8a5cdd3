//! Client-side sync engine.
//!
//! The engine owns the authoritative [`ScheduleMap`] and a detached working
//! copy of the selected teacher's schedule. The UI layer only reads and
//! edits through it. Edits are applied synchronously, merged back into the
//! map, and persisted by a background saver:
//!
//! - saves are debounced; every new edit re-arms the timer
//! - at most one save is in flight; edits made meanwhile produce exactly one
//!   follow-up save
//! - every save also refreshes the local cache, and a failed save leaves
//!   the in-memory edits intact
//!
//! Inbound remote snapshots (polled or pushed) pass through
//! [`SyncEngine::reconcile`], which only applies a snapshot when both its
//! version and its data differ from what the engine already has, and never
//! while local edits are pending or right after the engine's own write. A
//! foreign delivery suppressed that way is not dropped: once the engine is
//! quiet again it re-reads the store.

mod save_state;
mod status;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cache::LocalCache;
use crate::grid::Grid;
use crate::models::{Day, Schedule, ScheduleMap, SlotState, Version};
use crate::store::{RemoteSnapshot, RemoteStore};

pub use save_state::{SaveEvent, SaveState};
pub use status::{EngineEvent, ReconcileOutcome, StatusReport, SyncStatus};

/// Default quiet period before edits are saved.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);
/// Default window after an acknowledged save in which deliveries are treated
/// as echoes of that save.
pub const DEFAULT_SELF_WRITE_GRACE: Duration = Duration::from_millis(300);
/// Default wait before reopening a closed remote watch.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Timing knobs for the engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub debounce: Duration,
    pub self_write_grace: Duration,
    /// Wait before reopening a remote watch that closed or failed to open.
    pub poll_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            self_write_grace: DEFAULT_SELF_WRITE_GRACE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    schedules: ScheduleMap,
    current_teacher: Option<String>,
    working: Schedule,
    last_known_version: Option<Version>,
    save_state: SaveState,
    /// Edits the store has not acknowledged yet (survives failed saves).
    unsaved: bool,
    /// Deliveries before this instant are echoes of our own write.
    self_write_until: Option<Instant>,
    /// A foreign delivery was suppressed; re-read the store once quiet.
    missed_delivery: bool,
    degraded: bool,
}

impl EngineState {
    /// Copies the working schedule back into the map.
    fn flush_working(&mut self) {
        if let Some(teacher) = &self.current_teacher {
            self.schedules.insert(teacher.clone(), self.working.clone());
        }
    }

    /// Replaces the working copy with the map's schedule for the current teacher.
    fn reload_working(&mut self) {
        if let Some(teacher) = &self.current_teacher {
            self.working = self.schedules.get(teacher).cloned().unwrap_or_default();
        }
    }

    /// Local edits or our own recent write make deliveries untrustworthy.
    fn is_busy(&self) -> bool {
        self.save_state != SaveState::Idle || self.unsaved || self.self_write_until.is_some()
    }

    /// When a suppressed delivery should be caught up, if one is owed and
    /// nothing local stands in the way.
    fn catch_up_at(&self) -> Option<Instant> {
        if !self.missed_delivery || self.save_state != SaveState::Idle || self.unsaved {
            return None;
        }
        Some(self.self_write_until.unwrap_or_else(Instant::now))
    }

    fn record_edit(&mut self) {
        self.flush_working();
        self.unsaved = true;
        self.save_state = self.save_state.on(SaveEvent::Edit);
    }
}

struct Shared {
    remote: Option<Arc<dyn RemoteStore>>,
    cache: Arc<dyn LocalCache>,
    grid: Grid,
    roster: Vec<String>,
    options: EngineOptions,
    state: Mutex<EngineState>,
    edits: Notify,
    /// Signalled after every acknowledged save.
    acked: Notify,
    /// Held for the duration of a save so saves never overlap.
    save_lock: tokio::sync::Mutex<()>,
    status_tx: watch::Sender<StatusReport>,
    events_tx: broadcast::Sender<EngineEvent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: SyncStatus, message: impl Into<String>) {
        let report = StatusReport::new(status, message);
        tracing::debug!("Sync status: {}", report);
        self.status_tx.send_replace(report);
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events_tx.send(event);
    }

    /// Saves the current map to the remote store and the local cache.
    ///
    /// Without `force` this only runs when edits are waiting on the debounce
    /// timer; with `force` it also retries edits a previous save failed to
    /// persist.
    async fn perform_save(&self, force: bool) {
        let _guard = self.save_lock.lock().await;

        let payload = {
            let mut state = self.state();
            let pending = state.save_state == SaveState::Debouncing;
            if !(pending || (force && state.unsaved)) {
                return;
            }
            state.flush_working();
            state.unsaved = false;
            state.save_state = state.save_state.on(SaveEvent::TimerFired);
            state.schedules.clone()
        };

        let Some(remote) = &self.remote else {
            self.cache.save(&payload);
            {
                let mut state = self.state();
                state.save_state = state.save_state.on(SaveEvent::SaveFailed);
                state.unsaved = true;
                state.degraded = true;
            }
            self.set_status(
                SyncStatus::LocalOnly,
                "Remote store not configured - using local storage",
            );
            return;
        };

        self.set_status(SyncStatus::Syncing, "Saving to cloud...");
        tracing::debug!("Saving schedules for {} teacher(s)", payload.len());

        match remote.save_all(&payload).await {
            Ok(version) => {
                tracing::debug!("Saved to remote store, version {}", version);
                {
                    let mut state = self.state();
                    state.last_known_version = Some(version.clone());
                    state.self_write_until = Some(Instant::now() + self.options.self_write_grace);
                    state.save_state = state.save_state.on(SaveEvent::SaveAcked);
                    state.degraded = false;
                }
                self.acked.notify_one();
                // Local copy as backup even when the remote save succeeds
                self.cache.save(&payload);
                self.set_status(SyncStatus::Synced, "Saved to cloud");
                self.emit(EngineEvent::Saved { version });
            }
            Err(e) => {
                tracing::warn!("Failed to save schedules: {}", e);
                {
                    let mut state = self.state();
                    state.save_state = state.save_state.on(SaveEvent::SaveFailed);
                    state.unsaved = true;
                    state.degraded = true;
                }
                self.cache.save(&payload);
                let reason = e.status_reason();
                self.set_status(SyncStatus::LocalOnly, reason.clone());
                self.emit(EngineEvent::SaveFailed { reason });
            }
        }
    }

    fn reconcile(&self, snapshot: RemoteSnapshot) -> ReconcileOutcome {
        let mut state = self.state();

        if state
            .self_write_until
            .is_some_and(|until| Instant::now() >= until)
        {
            state.self_write_until = None;
        }

        let version_changed =
            snapshot.version.is_some() && snapshot.version != state.last_known_version;

        if state.is_busy() {
            // Push transports deliver a write once; remember to re-read it
            if version_changed {
                state.missed_delivery = true;
            }
            return ReconcileOutcome::Suppressed;
        }
        state.missed_delivery = false;

        if !version_changed {
            return ReconcileOutcome::Unchanged;
        }

        if !state.schedules.differs_from(&snapshot.schedules) {
            tracing::debug!("Version updated, data unchanged");
            state.last_known_version = snapshot.version;
            return ReconcileOutcome::VersionOnly;
        }

        tracing::info!("Applying remote update");
        state.schedules.merge_from(&snapshot.schedules);
        state.schedules.ensure_roster(&self.roster);
        state.last_known_version = snapshot.version.clone();
        state.reload_working();
        let schedules = state.schedules.clone();
        drop(state);

        self.cache.save(&schedules);
        self.set_status(SyncStatus::Synced, "Updated from cloud");
        self.emit(EngineEvent::RemoteApplied {
            version: snapshot.version,
        });
        ReconcileOutcome::Applied
    }

    /// Debounces edit notifications into saves until shutdown.
    async fn run_saver(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = self.edits.notified() => {}
                _ = shutdown.changed() => return,
            }

            // Each new edit re-arms the timer
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.debounce) => break,
                    _ = self.edits.notified() => continue,
                    _ = shutdown.changed() => return,
                }
            }

            self.perform_save(false).await;
        }
    }

    /// Re-reads the store after a delivery was suppressed.
    async fn catch_up(&self, remote: &Arc<dyn RemoteStore>) {
        self.state().missed_delivery = false;
        match remote.fetch_all().await {
            Ok(snapshot) => {
                let outcome = self.reconcile(snapshot);
                tracing::debug!("Caught up with remote store: {:?}", outcome);
            }
            Err(e) => {
                tracing::debug!("Failed to catch up with remote store: {}", e);
                self.state().missed_delivery = true;
                tokio::time::sleep(self.options.poll_interval).await;
            }
        }
    }

    /// Feeds remote snapshots into reconciliation, reopening the watch when
    /// it closes, until shutdown.
    async fn run_watcher(
        self: Arc<Self>,
        remote: Arc<dyn RemoteStore>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            match remote.watch().await {
                Ok(mut stream) => loop {
                    let catch_up_at = self.state().catch_up_at();
                    tokio::select! {
                        item = stream.next() => match item {
                            Some(Ok(snapshot)) => {
                                let outcome = self.reconcile(snapshot);
                                tracing::trace!("Remote delivery: {:?}", outcome);
                            }
                            // Polling failures are silent; the next tick retries
                            Some(Err(e)) => tracing::debug!("Remote watch error: {}", e),
                            None => break,
                        },
                        _ = sleep_until_some(catch_up_at) => self.catch_up(&remote).await,
                        // Re-evaluate the catch-up deadline
                        _ = self.acked.notified() => {}
                        _ = shutdown.changed() => return,
                    }
                },
                Err(e) => tracing::warn!("Failed to watch remote store: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                _ = shutdown.changed() => return,
            }
        }
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}

/// Mediates every read and write of the schedule map.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
}

impl SyncEngine {
    /// Creates an engine. `remote` is `None` when no store is configured, in
    /// which case the engine runs local-only from the start.
    pub fn new(
        remote: Option<Arc<dyn RemoteStore>>,
        cache: Arc<dyn LocalCache>,
        grid: Grid,
        roster: Vec<String>,
        options: EngineOptions,
    ) -> Self {
        let (status_tx, _) = watch::channel(StatusReport::new(SyncStatus::Syncing, "Starting..."));
        let (events_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                remote,
                cache,
                grid,
                roster,
                options,
                state: Mutex::new(EngineState::default()),
                edits: Notify::new(),
                acked: Notify::new(),
                save_lock: tokio::sync::Mutex::new(()),
                status_tx,
                events_tx,
                shutdown_tx,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Loads the initial map and starts the background tasks.
    ///
    /// The remote watch only starts when the initial fetch succeeded.
    /// Returns whether the remote store is in use.
    pub async fn init(&self) -> bool {
        let remote_ok = self.fetch_remote().await;

        let mut tasks = self.shared.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let saver = Arc::clone(&self.shared).run_saver(self.shared.shutdown_tx.subscribe());
        tasks.push(tokio::spawn(saver));

        if remote_ok {
            if let Some(remote) = &self.shared.remote {
                tracing::info!("Watching remote store ({})", remote.describe());
                let watcher = Arc::clone(&self.shared)
                    .run_watcher(Arc::clone(remote), self.shared.shutdown_tx.subscribe());
                tasks.push(tokio::spawn(watcher));
            }
        }

        remote_ok
    }

    /// Fetches the remote map and merges it in, remote winning per teacher.
    ///
    /// On failure or without a configured store, falls back to the local
    /// cache and enters local-only mode. Never fails.
    pub async fn fetch_remote(&self) -> bool {
        let shared = &self.shared;
        shared.set_status(SyncStatus::Syncing, "Syncing with cloud...");

        let result = match &shared.remote {
            Some(remote) => remote.fetch_all().await,
            None => {
                self.fall_back("Remote store not configured - using local storage");
                return false;
            }
        };

        match result {
            Ok(snapshot) => {
                let schedules = {
                    let mut state = shared.state();
                    state.schedules.merge_from(&snapshot.schedules);
                    state.schedules.ensure_roster(&shared.roster);
                    state.last_known_version = snapshot.version;
                    state.missed_delivery = false;
                    if state.save_state.has_pending_edits() || state.unsaved {
                        // Keep the local edit for the selected teacher
                        state.flush_working();
                    } else {
                        state.reload_working();
                    }
                    state.degraded = false;
                    state.schedules.clone()
                };
                tracing::info!("Loaded schedules for {} teacher(s)", schedules.len());
                shared.cache.save(&schedules);
                shared.set_status(SyncStatus::Synced, "Cloud sync active");
                true
            }
            Err(e) => {
                tracing::warn!("Failed to load schedules from remote store: {}", e);
                self.fall_back(e.status_reason());
                false
            }
        }
    }

    fn fall_back(&self, reason: impl Into<String>) {
        let shared = &self.shared;
        let cached = shared.cache.load();
        {
            let mut state = shared.state();
            if let Some(cached) = &cached {
                state.schedules.merge_from(cached);
            }
            state.schedules.ensure_roster(&shared.roster);
            state.reload_working();
            state.degraded = true;
        }
        shared.set_status(SyncStatus::LocalOnly, reason);
    }

    /// Selects a teacher, flushing the previous teacher's working copy into
    /// the map and scheduling a save for it first.
    pub fn select_teacher(&self, teacher: &str) {
        if self.current_teacher().is_some() {
            self.schedule_save();
        }
        let mut state = self.shared.state();
        state.current_teacher = Some(teacher.to_string());
        state.working = state.schedules.schedule_mut(teacher).clone();
    }

    /// Flushes the working copy and arms the debounced save.
    ///
    /// Calls within the debounce window collapse into one save. While a save
    /// is in flight, exactly one more save follows it.
    pub fn schedule_save(&self) {
        self.shared.state().record_edit();
        self.shared.edits.notify_one();
    }

    /// Sets one slot of the selected teacher's schedule; `None` clears it.
    ///
    /// Returns `false` without changing anything when no teacher is selected
    /// or the hour is outside the grid.
    pub fn set_slot(&self, day: Day, hour: u8, state: Option<SlotState>) -> bool {
        if !self.shared.grid.contains(hour) {
            return false;
        }
        {
            let mut engine = self.shared.state();
            if engine.current_teacher.is_none() {
                return false;
            }
            engine.working.set(day, hour, state);
        }
        self.schedule_save();
        true
    }

    /// Advances a slot through `none -> available -> unavailable -> none`.
    pub fn cycle_slot(&self, day: Day, hour: u8) -> bool {
        let next = SlotState::cycle(self.slot(day, hour));
        self.set_slot(day, hour, next)
    }

    /// Sets every slot of the grid to `state` with a single save.
    pub fn bulk_set(&self, state: Option<SlotState>) -> bool {
        {
            let mut engine = self.shared.state();
            if engine.current_teacher.is_none() {
                return false;
            }
            for key in self.shared.grid.slots() {
                engine.working.set(key.day, key.hour, state);
            }
        }
        self.schedule_save();
        true
    }

    /// Marks every slot available.
    pub fn select_all(&self) -> bool {
        self.bulk_set(Some(SlotState::Available))
    }

    /// Clears every slot.
    pub fn clear_all(&self) -> bool {
        self.bulk_set(None)
    }

    /// Applies one remote snapshot. Used by the watch task; exposed so
    /// callers with their own transport can feed deliveries in.
    pub fn reconcile(&self, snapshot: RemoteSnapshot) -> ReconcileOutcome {
        self.shared.reconcile(snapshot)
    }

    /// Saves immediately without waiting for the debounce timer.
    ///
    /// Waits for an in-flight save first. Does nothing when every edit has
    /// already been acknowledged.
    pub async fn flush_and_save(&self) {
        self.shared.state().flush_working();
        self.shared.perform_save(true).await;
    }

    /// Stops the background tasks. Pending edits not yet saved stay in memory.
    pub fn dispose(&self) {
        self.shared.shutdown_tx.send_replace(true);
        let tasks: Vec<_> = self
            .shared
            .tasks
            .lock()
            .map(|mut tasks| tasks.drain(..).collect())
            .unwrap_or_default();
        for task in tasks {
            task.abort();
        }
    }

    /// Flushes pending edits, then stops the background tasks.
    pub async fn shutdown(&self) {
        self.flush_and_save().await;
        self.dispose();
        tracing::debug!("Sync engine stopped");
    }

    pub fn current_teacher(&self) -> Option<String> {
        self.shared.state().current_teacher.clone()
    }

    /// State of a slot in the working copy.
    pub fn slot(&self, day: Day, hour: u8) -> Option<SlotState> {
        self.shared.state().working.get(day, hour)
    }

    pub fn working_schedule(&self) -> Schedule {
        self.shared.state().working.clone()
    }

    /// Snapshot of the whole map, including the working copy.
    pub fn schedule_map(&self) -> ScheduleMap {
        let mut state = self.shared.state();
        state.flush_working();
        state.schedules.clone()
    }

    pub fn schedule_for(&self, teacher: &str) -> Schedule {
        let state = self.shared.state();
        if state.current_teacher.as_deref() == Some(teacher) {
            return state.working.clone();
        }
        state.schedules.get(teacher).cloned().unwrap_or_default()
    }

    pub fn status(&self) -> StatusReport {
        self.shared.status_tx.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn status_updates(&self) -> watch::Receiver<StatusReport> {
        self.shared.status_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events_tx.subscribe()
    }

    pub fn save_state(&self) -> SaveState {
        self.shared.state().save_state
    }

    pub fn last_known_version(&self) -> Option<Version> {
        self.shared.state().last_known_version.clone()
    }

    /// Whether the engine is running against the local cache only.
    pub fn is_degraded(&self) -> bool {
        self.shared.state().degraded
    }

    pub fn grid(&self) -> Grid {
        self.shared.grid
    }

    pub fn roster(&self) -> &[String] {
        &self.shared.roster
    }
}

#[cfg(test)]
mod tests;
