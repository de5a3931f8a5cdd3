use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::TryRecvError;

use super::*;
use crate::cache::MemoryCache;
use crate::store::{MemoryStore, StoreError};

fn roster() -> Vec<String> {
    vec!["Alice".to_string(), "Bob".to_string()]
}

fn grid() -> Grid {
    Grid::new(8, 10).unwrap()
}

struct Harness {
    engine: SyncEngine,
    store: Arc<MemoryStore>,
    cache: Arc<MemoryCache>,
}

fn harness_with(store: MemoryStore, cache: MemoryCache) -> Harness {
    let store = Arc::new(store);
    let cache = Arc::new(cache);
    let remote: Arc<dyn RemoteStore> = store.clone();
    let engine = SyncEngine::new(
        Some(remote),
        cache.clone(),
        grid(),
        roster(),
        EngineOptions::default(),
    );
    Harness {
        engine,
        store,
        cache,
    }
}

fn harness() -> Harness {
    harness_with(MemoryStore::new(), MemoryCache::new())
}

async fn started(h: Harness) -> Harness {
    assert!(h.engine.init().await);
    // Let the background tasks open their watch
    tokio::time::sleep(Duration::from_millis(10)).await;
    h
}

fn map_with(teacher: &str, day: Day, hour: u8, state: SlotState) -> ScheduleMap {
    let mut map = ScheduleMap::new();
    map.schedule_mut(teacher).set(day, hour, Some(state));
    map
}

#[tokio::test]
async fn test_set_slot_last_write_wins() {
    let h = harness();
    h.engine.select_teacher("Alice");

    assert!(h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available)));
    assert!(h.engine.set_slot(Day::Monday, 8, Some(SlotState::Unavailable)));
    assert!(h.engine.set_slot(Day::Monday, 8, Some(SlotState::Navy)));
    assert!(h.engine.set_slot(Day::Monday, 8, Some(SlotState::Navy)));

    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Navy));
    assert_eq!(h.engine.working_schedule().len(), 1);
    assert_eq!(
        h.engine.schedule_map().get("Alice").unwrap().get(Day::Monday, 8),
        Some(SlotState::Navy)
    );
}

#[tokio::test]
async fn test_set_slot_none_removes_key() {
    let h = harness();
    h.engine.select_teacher("Alice");
    h.engine.set_slot(Day::Friday, 9, Some(SlotState::Salmon));
    h.engine.set_slot(Day::Friday, 9, None);

    assert!(h.engine.working_schedule().is_empty());
}

#[tokio::test]
async fn test_cycle_slot_returns_to_none() {
    let h = harness();
    h.engine.select_teacher("Alice");

    h.engine.cycle_slot(Day::Tuesday, 9);
    assert_eq!(h.engine.slot(Day::Tuesday, 9), Some(SlotState::Available));
    h.engine.cycle_slot(Day::Tuesday, 9);
    assert_eq!(h.engine.slot(Day::Tuesday, 9), Some(SlotState::Unavailable));
    h.engine.cycle_slot(Day::Tuesday, 9);
    assert_eq!(h.engine.slot(Day::Tuesday, 9), None);
}

#[tokio::test]
async fn test_no_teacher_is_noop() {
    let h = harness();

    assert!(!h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available)));
    assert!(!h.engine.cycle_slot(Day::Monday, 8));
    assert!(!h.engine.select_all());
    assert!(!h.engine.clear_all());
    assert_eq!(h.engine.save_state(), SaveState::Idle);
    assert!(h.engine.schedule_map().is_empty());
}

#[tokio::test]
async fn test_hour_outside_grid_is_rejected() {
    let h = harness();
    h.engine.select_teacher("Alice");

    assert!(!h.engine.set_slot(Day::Monday, 10, Some(SlotState::Available)));
    assert!(!h.engine.set_slot(Day::Monday, 7, Some(SlotState::Available)));
    assert!(h.engine.working_schedule().is_empty());
    assert_eq!(h.engine.save_state(), SaveState::Idle);
}

#[tokio::test]
async fn test_switching_teachers_preserves_edits() {
    let h = harness();
    h.engine.select_teacher("Alice");
    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));

    h.engine.select_teacher("Bob");
    assert!(h.engine.working_schedule().is_empty());
    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Cyan));

    h.engine.select_teacher("Alice");
    assert_eq!(h.engine.current_teacher().as_deref(), Some("Alice"));
    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Available));
    assert_eq!(
        h.engine.schedule_for("Bob").get(Day::Monday, 8),
        Some(SlotState::Cyan)
    );
}

#[tokio::test(start_paused = true)]
async fn test_bulk_set_round_trip_saves_once() {
    let h = started(harness()).await;
    h.engine.select_teacher("Alice");

    assert!(h.engine.select_all());
    assert_eq!(h.engine.working_schedule().len(), grid().slot_count());
    assert!(h.engine.clear_all());
    assert!(h.engine.working_schedule().is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.store.save_count(), 1);
    let saved = h.store.saves().pop().unwrap();
    assert!(saved.get("Alice").unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_edits_within_debounce_window_coalesce() {
    let h = started(harness()).await;
    h.engine.select_teacher("Alice");

    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.engine.set_slot(Day::Monday, 9, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_millis(500)).await;

    // The second edit re-armed the timer
    assert_eq!(h.store.save_count(), 0);
    assert_eq!(h.engine.save_state(), SaveState::Debouncing);

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.store.save_count(), 1);
    let alice = h.store.snapshot().schedules.get("Alice").cloned().unwrap();
    assert_eq!(alice.get(Day::Monday, 8), Some(SlotState::Available));
    assert_eq!(alice.get(Day::Monday, 9), Some(SlotState::Available));
    assert_eq!(h.engine.save_state(), SaveState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_edit_during_save_runs_exactly_one_more_save() {
    let h = started(harness()).await;
    h.store.set_save_delay(Some(Duration::from_secs(1)));
    h.engine.select_teacher("Alice");

    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(h.engine.save_state(), SaveState::Saving);

    h.engine.set_slot(Day::Monday, 9, Some(SlotState::Unavailable));
    h.engine.set_slot(Day::Sunday, 9, Some(SlotState::Unavailable));
    assert_eq!(h.engine.save_state(), SaveState::SavingWithPendingEdit);

    tokio::time::sleep(Duration::from_secs(4)).await;

    let saves = h.store.saves();
    assert_eq!(saves.len(), 2);
    let first = saves[0].get("Alice").unwrap();
    assert_eq!(first.len(), 1);
    let second = saves[1].get("Alice").unwrap();
    assert_eq!(second.get(Day::Monday, 9), Some(SlotState::Unavailable));
    assert_eq!(second.get(Day::Sunday, 9), Some(SlotState::Unavailable));
    assert_eq!(h.engine.save_state(), SaveState::Idle);
}

#[tokio::test]
async fn test_fetch_remote_merges_and_records_version() {
    let store = MemoryStore::with_schedules(map_with("Alice", Day::Monday, 8, SlotState::Navy));
    let h = harness_with(store, MemoryCache::new());

    assert!(h.engine.fetch_remote().await);

    let map = h.engine.schedule_map();
    assert_eq!(map.len(), 2);
    assert!(map.get("Bob").unwrap().is_empty());
    assert_eq!(h.engine.last_known_version(), Some(Version::new("v1")));
    assert!(!h.engine.is_degraded());
    assert_eq!(h.engine.status().status, SyncStatus::Synced);
    assert_eq!(h.engine.status().message, "Cloud sync active");
    // The fetched map also lands in the local cache
    assert_eq!(h.cache.load(), Some(map));
}

#[tokio::test]
async fn test_unconfigured_store_falls_back_to_cache() {
    let cached = map_with("Bob", Day::Wednesday, 9, SlotState::Magenta);
    let h = harness_with(MemoryStore::new(), MemoryCache::with_schedules(cached));
    h.store.set_failure(Some(StoreError::Unconfigured(
        "KV store not configured".to_string(),
    )));

    assert!(!h.engine.init().await);

    assert!(h.engine.is_degraded());
    let status = h.engine.status();
    assert_eq!(status.status, SyncStatus::LocalOnly);
    assert_eq!(status.message, "KV not configured - check server settings");
    assert_eq!(
        h.engine.schedule_for("Bob").get(Day::Wednesday, 9),
        Some(SlotState::Magenta)
    );
    assert!(h.engine.schedule_map().get("Alice").unwrap().is_empty());
    h.engine.dispose();
}

#[tokio::test]
async fn test_missing_remote_runs_local_only() {
    let cache = Arc::new(MemoryCache::new());
    let engine = SyncEngine::new(None, cache.clone(), grid(), roster(), EngineOptions::default());

    assert!(!engine.init().await);
    assert!(engine.is_degraded());
    assert_eq!(engine.status().status, SyncStatus::LocalOnly);

    engine.select_teacher("Alice");
    engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    engine.shutdown().await;

    let cached = cache.load().unwrap();
    assert_eq!(
        cached.get("Alice").unwrap().get(Day::Monday, 8),
        Some(SlotState::Available)
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_keeps_edits_and_retries() {
    let h = started(harness()).await;
    let mut events = h.engine.subscribe();
    h.engine.select_teacher("Alice");
    h.store
        .set_failure(Some(StoreError::Unreachable("connection refused".to_string())));

    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.store.save_count(), 0);
    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Available));
    assert!(h.engine.is_degraded());
    assert_eq!(h.engine.status().status, SyncStatus::LocalOnly);
    assert_eq!(
        events.try_recv().unwrap(),
        EngineEvent::SaveFailed {
            reason: "Offline mode (local storage only)".to_string()
        }
    );
    let cached = h.cache.load().unwrap();
    assert_eq!(
        cached.get("Alice").unwrap().get(Day::Monday, 8),
        Some(SlotState::Available)
    );

    h.store.set_failure(None);
    h.engine.flush_and_save().await;

    assert_eq!(h.store.save_count(), 1);
    assert!(!h.engine.is_degraded());
    assert_eq!(h.engine.status().message, "Saved to cloud");
    h.engine.dispose();
}

#[tokio::test]
async fn test_flush_without_edits_does_not_save() {
    let h = harness();
    assert!(h.engine.fetch_remote().await);
    h.engine.select_teacher("Alice");

    h.engine.flush_and_save().await;

    assert_eq!(h.store.save_count(), 0);
}

#[tokio::test]
async fn test_shutdown_flushes_pending_edit() {
    let h = started(harness()).await;
    h.engine.select_teacher("Alice");
    h.engine.set_slot(Day::Saturday, 9, Some(SlotState::Available));

    h.engine.shutdown().await;

    assert_eq!(h.store.save_count(), 1);
    assert_eq!(h.engine.save_state(), SaveState::Idle);
    assert_eq!(
        h.store.snapshot().schedules.get("Alice").unwrap().get(Day::Saturday, 9),
        Some(SlotState::Available)
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_background_saves() {
    let h = started(harness()).await;
    h.engine.select_teacher("Alice");
    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    h.engine.shutdown().await;

    h.engine.set_slot(Day::Monday, 9, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(h.store.save_count(), 1);
}

#[tokio::test]
async fn test_version_only_change_is_not_applied() {
    let store = MemoryStore::with_schedules(map_with("Alice", Day::Monday, 8, SlotState::Navy));
    let h = harness_with(store, MemoryCache::new());
    h.engine.fetch_remote().await;
    let mut events = h.engine.subscribe();

    h.store.touch();
    let outcome = h.engine.reconcile(h.store.snapshot());

    assert_eq!(outcome, ReconcileOutcome::VersionOnly);
    assert_eq!(h.engine.last_known_version(), Some(Version::new("v2")));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_same_version_is_unchanged() {
    let store = MemoryStore::with_schedules(map_with("Alice", Day::Monday, 8, SlotState::Navy));
    let h = harness_with(store, MemoryCache::new());
    h.engine.fetch_remote().await;

    let outcome = h.engine.reconcile(h.store.snapshot());

    assert_eq!(outcome, ReconcileOutcome::Unchanged);
}

#[tokio::test(start_paused = true)]
async fn test_foreign_change_is_applied() {
    let h = started(harness()).await;
    let mut events = h.engine.subscribe();
    h.engine.select_teacher("Alice");

    let version = h
        .store
        .put_external(map_with("Alice", Day::Thursday, 9, SlotState::Unavailable));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(h.engine.slot(Day::Thursday, 9), Some(SlotState::Unavailable));
    assert_eq!(h.engine.last_known_version(), Some(version.clone()));
    assert_eq!(
        events.try_recv().unwrap(),
        EngineEvent::RemoteApplied {
            version: Some(version)
        }
    );
    assert_eq!(h.engine.status().message, "Updated from cloud");
    // Roster entries the remote lacks are kept
    assert!(h.engine.schedule_map().get("Bob").is_some());
    h.engine.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_own_write_echo_is_suppressed() {
    let h = started(harness()).await;
    let mut events = h.engine.subscribe();
    h.engine.select_teacher("Alice");

    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_millis(850)).await;

    assert_eq!(h.store.save_count(), 1);
    assert!(matches!(
        events.try_recv().unwrap(),
        EngineEvent::Saved { .. }
    ));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(h.engine.status().message, "Saved to cloud");

    // A re-delivery inside the grace window is ignored outright
    assert_eq!(
        h.engine.reconcile(h.store.snapshot()),
        ReconcileOutcome::Suppressed
    );
    h.engine.dispose();
}

#[tokio::test]
async fn test_delivery_suppressed_while_edit_pending() {
    let h = harness();
    h.engine.fetch_remote().await;
    h.engine.select_teacher("Alice");
    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));

    h.store
        .put_external(map_with("Alice", Day::Monday, 8, SlotState::Unavailable));
    let outcome = h.engine.reconcile(h.store.snapshot());

    assert_eq!(outcome, ReconcileOutcome::Suppressed);
    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Available));
    assert_eq!(h.engine.last_known_version(), None);
}

#[tokio::test]
async fn test_select_teacher_schedules_save_for_previous() {
    let h = harness();
    h.engine.select_teacher("Alice");
    assert_eq!(h.engine.save_state(), SaveState::Idle);

    h.engine.select_teacher("Bob");

    assert_eq!(h.engine.save_state(), SaveState::Debouncing);
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_edit_survives_foreign_delivery() {
    let h = started(harness()).await;
    h.engine.select_teacher("Alice");
    h.store
        .set_failure(Some(StoreError::Unreachable("connection refused".to_string())));

    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.save_count(), 0);
    assert_eq!(h.engine.save_state(), SaveState::Idle);

    h.store.set_failure(None);
    let mut foreign = map_with("Bob", Day::Friday, 9, SlotState::Cyan);
    foreign.ensure_roster(&roster());
    h.store.put_external(foreign.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The unsaved edit is still there
    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Available));
    assert_eq!(
        h.engine.reconcile(h.store.snapshot()),
        ReconcileOutcome::Suppressed
    );

    h.engine.flush_and_save().await;

    let saved = h.store.saves().pop().unwrap();
    assert_eq!(
        saved.get("Alice").unwrap().get(Day::Monday, 8),
        Some(SlotState::Available)
    );
    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Available));
    h.engine.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_push_delivery_during_grace_is_caught_up() {
    let h = started(harness()).await;
    let mut events = h.engine.subscribe();
    h.engine.select_teacher("Alice");

    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    tokio::time::sleep(Duration::from_millis(850)).await;
    assert_eq!(h.store.save_count(), 1);
    assert!(matches!(
        events.try_recv().unwrap(),
        EngineEvent::Saved { .. }
    ));

    // Another device writes while our own write is still echoing
    let mut foreign = h.store.snapshot().schedules;
    foreign
        .schedule_mut("Bob")
        .set(Day::Friday, 9, Some(SlotState::Cyan));
    let version = h.store.put_external(foreign);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.engine.schedule_for("Bob").get(Day::Friday, 9), None);

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        h.engine.schedule_for("Bob").get(Day::Friday, 9),
        Some(SlotState::Cyan)
    );
    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Available));
    assert_eq!(h.engine.last_known_version(), Some(version.clone()));
    assert_eq!(
        events.try_recv().unwrap(),
        EngineEvent::RemoteApplied {
            version: Some(version)
        }
    );
    // No extra save
    assert_eq!(h.store.save_count(), 1);
    h.engine.dispose();
}

#[tokio::test(start_paused = true)]
async fn test_delivery_during_debounce_is_superseded_by_own_save() {
    let h = started(harness()).await;
    h.engine.select_teacher("Alice");

    h.engine.set_slot(Day::Monday, 8, Some(SlotState::Available));
    h.store
        .put_external(map_with("Bob", Day::Friday, 9, SlotState::Cyan));
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Whole-document saves overwrite the foreign write; the catch-up read
    // finds our own version and changes nothing
    assert_eq!(h.store.save_count(), 1);
    assert_eq!(h.engine.last_known_version(), h.store.snapshot().version);
    assert_eq!(h.engine.slot(Day::Monday, 8), Some(SlotState::Available));
    assert_eq!(h.engine.schedule_for("Bob").get(Day::Friday, 9), None);
    h.engine.dispose();
}
