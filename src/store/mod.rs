//! Client-side cache of the user's analysis records.
//!
//! The store reconciles three input channels: the bulk fetch
//! (`initialize`), local actions (`add_record`, `update_title`) and the
//! push channel (`apply_status_event`). Consumers never see the records by
//! reference; every mutation publishes a fresh [`StoreSnapshot`] on a
//! `watch` channel.
//!
//! No lock is held across a backend call. Each handler is a short critical
//! section, so mutations are atomic with respect to each other.
//!
//! A bulk fetch can be overtaken by local writes and push events that land
//! while it is in flight. Every write is stamped with a sequence number and
//! each fetch remembers the number it started at; when the response is
//! installed, writes newer than the fetch win over the fetched data and a
//! response older than the last installed one is dropped.

use crate::api::VideoBackend;
use crate::error::{StoreError, FETCH_FAILED_MESSAGE};
use crate::models::{AnalysisRecord, AnalysisStatus, StatusEvent};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Read-only view of the store handed to consumers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    /// Records, most recent first.
    pub records: Vec<AnalysisRecord>,
    /// A bulk fetch is in flight.
    pub loading: bool,
    /// Displayable message from the last failed fetch.
    pub error: Option<String>,
    /// Completion time of the last successful bulk fetch.
    pub last_synced: Option<DateTime<Utc>>,
}

/// What `apply_status_event` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Status and progress were merged into the record.
    Applied,
    /// No record with that id; the event was dropped.
    UnknownRecord,
    /// The status would move the record backwards; the event was dropped.
    Stale,
}

/// Local title write not yet reflected by a fetch.
#[derive(Debug)]
struct TitleWrite {
    title: String,
    seq: u64,
    /// The PATCH has not returned yet.
    pending: bool,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<AnalysisRecord>,
    loading: bool,
    error: Option<String>,
    last_synced: Option<DateTime<Utc>>,
    just_completed: Option<String>,
    seq: u64,
    last_installed: Option<u64>,
    titles: HashMap<String, TitleWrite>,
    added: HashMap<String, u64>,
}

impl State {
    fn find_mut(&mut self, id: &str) -> Option<&mut AnalysisRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    fn bump(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Install the result of a fetch that started at `started`.
    ///
    /// Returns false when a newer fetch has already been installed.
    fn install(&mut self, mut fetched: Vec<AnalysisRecord>, started: u64) -> bool {
        if self.last_installed.is_some_and(|last| started < last) {
            return false;
        }

        for record in fetched.iter_mut() {
            if let Some(local) = self.records.iter().find(|r| r.id == record.id) {
                let regresses = !local.status.can_transition_to(record.status)
                    || (local.status == record.status && local.progress > record.progress);
                if regresses {
                    record.status = local.status;
                    record.progress = local.progress;
                }
            }
            if let Some(write) = self.titles.get(&record.id) {
                if write.pending || write.seq > started {
                    record.title = write.title.clone();
                }
            }
        }

        let mut records: Vec<AnalysisRecord> = self
            .records
            .iter()
            .filter(|r| self.added.get(&r.id).is_some_and(|seq| *seq > started))
            .filter(|r| !fetched.iter().any(|f| f.id == r.id))
            .cloned()
            .collect();
        records.extend(fetched);
        self.records = records;

        self.titles.retain(|_, w| w.pending || w.seq > started);
        self.added.retain(|_, seq| *seq > started);
        self.last_installed = Some(started);
        true
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            records: self.records.clone(),
            loading: self.loading,
            error: self.error.clone(),
            last_synced: self.last_synced,
        }
    }
}

/// Observable collection of analysis records.
///
/// Cheap to clone; clones share the same collection.
#[derive(Clone)]
pub struct AnalysisCollectionStore {
    backend: Arc<dyn VideoBackend>,
    state: Arc<Mutex<State>>,
    notifier: Arc<watch::Sender<StoreSnapshot>>,
}

impl AnalysisCollectionStore {
    /// Create an empty store that talks to `backend`.
    pub fn new(backend: Arc<dyn VideoBackend>) -> Self {
        let (notifier, _) = watch::channel(StoreSnapshot::default());
        Self {
            backend,
            state: Arc::new(Mutex::new(State::default())),
            notifier: Arc::new(notifier),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &State) {
        self.notifier.send_replace(state.snapshot());
    }

    /// Run `f` on the state and notify subscribers.
    fn mutate<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        self.publish(&state);
        result
    }

    /// Replace the collection with the backend's current list.
    ///
    /// On failure the collection keeps its previous contents (empty on the
    /// first load) and the snapshot carries a displayable error.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let started = self.mutate(|s| {
            s.loading = true;
            s.bump()
        });

        match self.backend.list_videos().await {
            Ok(records) => {
                let records = dedupe_by_id(records);
                let count = records.len();
                let installed = self.mutate(|s| {
                    s.loading = false;
                    s.error = None;
                    let installed = s.install(records, started);
                    if installed {
                        s.last_synced = Some(Utc::now());
                    }
                    installed
                });
                if installed {
                    info!("Loaded {} analyses", count);
                } else {
                    debug!("Discarding a list response overtaken by a newer one");
                }
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load analyses: {}", e);
                self.mutate(|s| {
                    s.loading = false;
                    s.error = Some(FETCH_FAILED_MESSAGE.to_string());
                });
                Err(StoreError::fetch(e))
            }
        }
    }

    /// Insert a freshly created record at the head of the collection.
    ///
    /// A record whose id is already present is merged in place instead of
    /// being inserted again; its status only moves forward.
    pub fn add_record(&self, record: AnalysisRecord) {
        self.mutate(|s| {
            let seq = s.bump();
            s.added.insert(record.id.clone(), seq);
            if let Some(existing) = s.find_mut(&record.id) {
                debug!("Record {} already present, merging in place", record.id);
                existing.title = record.title;
                existing.extra.extend(record.extra);
                if existing.status.can_transition_to(record.status) {
                    existing.status = record.status;
                    existing.progress = record.progress;
                }
            } else {
                debug!("Adding record {}", record.id);
                s.records.insert(0, record);
            }
        });
    }

    /// Rename a record optimistically, rolling back if the backend refuses.
    ///
    /// The rollback only touches the title, and only while it still holds
    /// the value this call wrote, so concurrent pushes and later edits are
    /// kept.
    pub async fn update_title(&self, id: &str, new_title: &str) -> Result<(), StoreError> {
        let previous = {
            let mut state = self.lock();
            let record = state
                .find_mut(id)
                .ok_or_else(|| StoreError::UnknownRecord(id.to_string()))?;
            if record.title == new_title {
                return Ok(());
            }
            let previous = std::mem::replace(&mut record.title, new_title.to_string());
            let seq = state.bump();
            state.titles.insert(
                id.to_string(),
                TitleWrite {
                    title: new_title.to_string(),
                    seq,
                    pending: true,
                },
            );
            self.publish(&state);
            previous
        };

        match self.backend.update_title(id, new_title).await {
            Ok(()) => {
                debug!("Title of {} saved", id);
                let mut state = self.lock();
                let seq = state.bump();
                if let Some(write) = state.titles.get_mut(id) {
                    if write.pending && write.title == new_title {
                        write.pending = false;
                        write.seq = seq;
                    }
                }
                Ok(())
            }
            Err(e) => {
                warn!("Failed to update title of {}: {}", id, e);
                self.mutate(|s| {
                    if s.titles.get(id).is_some_and(|w| w.pending && w.title == new_title) {
                        s.titles.remove(id);
                    }
                    if let Some(record) = s.find_mut(id) {
                        if record.title == new_title {
                            record.title = previous;
                        }
                    }
                });
                Err(StoreError::mutation(e))
            }
        }
    }

    /// Merge one push event into the collection.
    ///
    /// Only `status` and `progress` are written. Events for unknown ids and
    /// events that would move a record backwards are dropped.
    pub fn apply_status_event(&self, event: &StatusEvent) -> EventOutcome {
        let mut state = self.lock();

        let Some(record) = state.find_mut(&event.video_id) else {
            debug!("Dropping status event for unknown record {}", event.video_id);
            return EventOutcome::UnknownRecord;
        };

        if !record.status.can_transition_to(event.status) {
            debug!(
                "Dropping stale status event for {}: {} -> {}",
                event.video_id, record.status, event.status
            );
            return EventOutcome::Stale;
        }

        record.status = event.status;
        record.progress = event.progress.min(100);

        if event.status == AnalysisStatus::Completed {
            state.just_completed = Some(event.video_id.clone());
        }

        self.publish(&state);
        EventOutcome::Applied
    }

    /// Take the just-completed marker, leaving it empty.
    pub fn consume_just_completed(&self) -> Option<String> {
        self.lock().just_completed.take()
    }

    /// Take the marker only if it names `id`.
    pub fn consume_just_completed_for(&self, id: &str) -> bool {
        let mut state = self.lock();
        if state.just_completed.as_deref() == Some(id) {
            state.just_completed = None;
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    pub fn records(&self) -> Vec<AnalysisRecord> {
        self.lock().records.clone()
    }

    pub fn get(&self, id: &str) -> Option<AnalysisRecord> {
        self.lock().records.iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.notifier.subscribe()
    }
}

/// Keep the first occurrence of each id, preserving order.
fn dedupe_by_id(records: Vec<AnalysisRecord>) -> Vec<AnalysisRecord> {
    let mut seen = HashSet::new();
    let before = records.len();
    let unique: Vec<AnalysisRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    if unique.len() != before {
        warn!("Backend returned {} duplicate records", before - unique.len());
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::FakeBackend;
    use AnalysisStatus::*;

    fn ids(store: &AnalysisCollectionStore) -> Vec<String> {
        store.records().into_iter().map(|r| r.id).collect()
    }

    fn store_with(records: Vec<AnalysisRecord>) -> (AnalysisCollectionStore, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::with_records(records));
        (AnalysisCollectionStore::new(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_initialize_replaces_collection() {
        let (store, _) = store_with(vec![
            AnalysisRecord::new("1", "First"),
            AnalysisRecord::new("2", "Second"),
        ]);
        store.add_record(AnalysisRecord::new("local", "Local"));

        store.initialize().await.unwrap();

        assert_eq!(ids(&store), vec!["1", "2"]);
        let snap = store.snapshot();
        assert!(!snap.loading);
        assert!(snap.error.is_none());
        assert!(snap.last_synced.is_some());
    }

    #[tokio::test]
    async fn test_initialize_failure_keeps_last_known_good() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("1", "First")]);

        backend.fail_list(true);
        let err = store.initialize().await.unwrap_err();
        assert!(matches!(err, StoreError::Fetch { .. }));
        assert!(store.is_empty());
        assert_eq!(store.snapshot().error.as_deref(), Some(FETCH_FAILED_MESSAGE));

        backend.fail_list(false);
        store.initialize().await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.snapshot().error.is_none());

        backend.fail_list(true);
        assert!(store.initialize().await.is_err());
        assert_eq!(ids(&store), vec!["1"]);
    }

    #[tokio::test]
    async fn test_initialize_deduplicates() {
        let (store, _) = store_with(vec![
            AnalysisRecord::new("1", "First"),
            AnalysisRecord::new("1", "Again"),
            AnalysisRecord::new("2", "Second"),
        ]);
        store.initialize().await.unwrap();
        assert_eq!(ids(&store), vec!["1", "2"]);
        assert_eq!(store.get("1").unwrap().title, "First");
    }

    #[test]
    fn test_add_record_prepends() {
        let (store, _) = store_with(vec![]);
        store.add_record(AnalysisRecord::new("y", "Y"));
        store.add_record(AnalysisRecord::new("x", "X"));
        store.add_record(AnalysisRecord::new("z", "Z"));
        assert_eq!(ids(&store), vec!["z", "x", "y"]);
    }

    #[test]
    fn test_add_record_twice_keeps_one_entry() {
        let (store, _) = store_with(vec![]);
        store.add_record(AnalysisRecord::new("a", "First"));
        store.add_record(AnalysisRecord::new("b", "B"));
        store.apply_status_event(&StatusEvent::new("a", Processing, 40));

        store.add_record(AnalysisRecord::new("a", "Resubmitted"));

        assert_eq!(ids(&store), vec!["b", "a"]);
        let a = store.get("a").unwrap();
        assert_eq!(a.title, "Resubmitted");
        assert_eq!(a.status, Processing);
        assert_eq!(a.progress, 40);
    }

    #[tokio::test]
    async fn test_uniqueness_across_operations() {
        let (store, _) = store_with(vec![
            AnalysisRecord::new("1", "One"),
            AnalysisRecord::new("2", "Two"),
        ]);
        store.add_record(AnalysisRecord::new("1", "One"));
        store.initialize().await.unwrap();
        store.add_record(AnalysisRecord::new("2", "Two"));
        store.add_record(AnalysisRecord::new("3", "Three"));
        store.apply_status_event(&StatusEvent::new("3", Completed, 100));
        store.add_record(AnalysisRecord::new("3", "Three"));

        let all = ids(&store);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(all, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_status_event_merges_shallowly() {
        let mut record = AnalysisRecord::new("a", "Title");
        record
            .extra
            .insert("duration_seconds".to_string(), serde_json::json!(9.5));
        let (store, _) = store_with(vec![]);
        store.add_record(record);

        let outcome = store.apply_status_event(&StatusEvent::new("a", Processing, 55));

        assert_eq!(outcome, EventOutcome::Applied);
        let a = store.get("a").unwrap();
        assert_eq!(a.status, Processing);
        assert_eq!(a.progress, 55);
        assert_eq!(a.title, "Title");
        assert_eq!(a.extra["duration_seconds"], serde_json::json!(9.5));
    }

    #[test]
    fn test_status_never_leaves_terminal() {
        let (store, _) = store_with(vec![]);
        store.add_record(AnalysisRecord::new("a", "A"));

        let events = [
            StatusEvent::new("a", Processing, 10),
            StatusEvent::new("a", Completed, 100),
            StatusEvent::new("a", Processing, 90),
            StatusEvent::new("a", Pending, 0),
            StatusEvent::new("a", Failed, 0),
        ];
        let outcomes: Vec<_> = events.iter().map(|e| store.apply_status_event(e)).collect();

        assert_eq!(
            outcomes,
            vec![
                EventOutcome::Applied,
                EventOutcome::Applied,
                EventOutcome::Stale,
                EventOutcome::Stale,
                EventOutcome::Stale,
            ]
        );
        let a = store.get("a").unwrap();
        assert_eq!(a.status, Completed);
        assert_eq!(a.progress, 100);
    }

    #[test]
    fn test_unknown_id_leaves_collection_unchanged() {
        let (store, _) = store_with(vec![]);
        assert_eq!(
            store.apply_status_event(&StatusEvent::new("unknown-123", Completed, 100)),
            EventOutcome::UnknownRecord
        );
        assert!(store.is_empty());

        store.add_record(AnalysisRecord::new("a", "A"));
        let before = store.snapshot();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.apply_status_event(&StatusEvent::new("unknown-123", Completed, 100));

        assert_eq!(store.snapshot(), before);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.consume_just_completed(), None);
    }

    #[test]
    fn test_repeated_event_is_idempotent() {
        let (store, _) = store_with(vec![]);
        store.add_record(AnalysisRecord::new("a", "A"));
        let event = StatusEvent::new("a", Processing, 30);
        store.apply_status_event(&event);
        let once = store.snapshot();
        store.apply_status_event(&event);
        assert_eq!(store.snapshot(), once);
    }

    #[tokio::test]
    async fn test_update_title_rolls_back_on_failure() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "Old")]);
        store.initialize().await.unwrap();
        backend.fail_updates_with(ApiError::Http {
            status: 400,
            message: "Title rejected".to_string(),
        });

        let result = store.update_title("a", "New").await;

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Mutation { .. }));
        assert_eq!(err.to_string(), "Title rejected");
        assert_eq!(store.get("a").unwrap().title, "Old");
        assert_eq!(backend.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_title_success() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "Old")]);
        store.initialize().await.unwrap();

        store.update_title("a", "New").await.unwrap();

        assert_eq!(store.get("a").unwrap().title, "New");
        assert_eq!(backend.titles(), vec![("a".to_string(), "New".to_string())]);
    }

    #[tokio::test]
    async fn test_update_title_noop_and_unknown() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "Same")]);
        store.initialize().await.unwrap();

        store.update_title("a", "Same").await.unwrap();
        assert_eq!(backend.update_calls(), 0);

        let err = store.update_title("missing", "X").await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownRecord(_)));
        assert_eq!(backend.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_rollback_keeps_concurrent_status_push() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "Old")]);
        store.initialize().await.unwrap();
        let gate = backend.hold_updates();
        backend.fail_updates_with(ApiError::Transport("connection reset".to_string()));

        let editing = {
            let store = store.clone();
            tokio::spawn(async move { store.update_title("a", "New").await })
        };
        backend.wait_for_update().await;

        assert_eq!(store.get("a").unwrap().title, "New");
        store.apply_status_event(&StatusEvent::new("a", Processing, 70));
        gate.notify_one();

        let err = editing.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), crate::error::GENERIC_MUTATION_MESSAGE);
        let a = store.get("a").unwrap();
        assert_eq!(a.title, "Old");
        assert_eq!(a.status, Processing);
        assert_eq!(a.progress, 70);
    }

    #[tokio::test]
    async fn test_refresh_in_flight_keeps_terminal_status() {
        let (store, backend) =
            store_with(vec![AnalysisRecord::new("a", "A").with_status(Processing, 40)]);
        store.initialize().await.unwrap();
        let gate = backend.hold_next_list();

        let refresh = {
            let store = store.clone();
            tokio::spawn(async move { store.initialize().await })
        };
        backend.wait_for_list().await;
        store.apply_status_event(&StatusEvent::new("a", Completed, 100));
        gate.notify_one();
        refresh.await.unwrap().unwrap();

        let a = store.get("a").unwrap();
        assert_eq!(a.status, Completed);
        assert_eq!(a.progress, 100);
    }

    #[tokio::test]
    async fn test_refresh_does_not_rewind_progress() {
        let (store, backend) =
            store_with(vec![AnalysisRecord::new("a", "A").with_status(Processing, 40)]);
        store.initialize().await.unwrap();
        store.apply_status_event(&StatusEvent::new("a", Processing, 75));

        store.initialize().await.unwrap();
        assert_eq!(store.get("a").unwrap().progress, 75);

        backend.set_records(vec![AnalysisRecord::new("a", "A").with_status(Failed, 0)]);
        store.initialize().await.unwrap();
        assert_eq!(store.get("a").unwrap().status, Failed);
    }

    #[tokio::test]
    async fn test_refresh_in_flight_keeps_confirmed_title() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "Old")]);
        store.initialize().await.unwrap();
        let gate = backend.hold_next_list();

        let refresh = {
            let store = store.clone();
            tokio::spawn(async move { store.initialize().await })
        };
        backend.wait_for_list().await;
        store.update_title("a", "New").await.unwrap();
        gate.notify_one();
        refresh.await.unwrap().unwrap();

        assert_eq!(store.get("a").unwrap().title, "New");
        store.initialize().await.unwrap();
        assert_eq!(store.get("a").unwrap().title, "New");
    }

    #[tokio::test]
    async fn test_refresh_during_pending_rename() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "Old")]);
        store.initialize().await.unwrap();
        let gate = backend.hold_updates();

        let editing = {
            let store = store.clone();
            tokio::spawn(async move { store.update_title("a", "New").await })
        };
        backend.wait_for_update().await;
        store.initialize().await.unwrap();
        assert_eq!(store.get("a").unwrap().title, "New");

        gate.notify_one();
        editing.await.unwrap().unwrap();
        assert_eq!(store.get("a").unwrap().title, "New");
        assert_eq!(backend.titles(), vec![("a".to_string(), "New".to_string())]);
    }

    #[tokio::test]
    async fn test_refresh_during_failing_rename_rolls_back() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "Old")]);
        store.initialize().await.unwrap();
        let gate = backend.hold_updates();
        backend.fail_updates_with(ApiError::Http {
            status: 500,
            message: String::new(),
        });

        let editing = {
            let store = store.clone();
            tokio::spawn(async move { store.update_title("a", "New").await })
        };
        backend.wait_for_update().await;
        store.initialize().await.unwrap();
        gate.notify_one();

        assert!(editing.await.unwrap().is_err());
        assert_eq!(store.get("a").unwrap().title, "Old");
        store.initialize().await.unwrap();
        assert_eq!(store.get("a").unwrap().title, "Old");
    }

    #[tokio::test]
    async fn test_record_added_during_refresh_survives() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "A")]);
        let gate = backend.hold_next_list();

        let refresh = {
            let store = store.clone();
            tokio::spawn(async move { store.initialize().await })
        };
        backend.wait_for_list().await;
        store.add_record(AnalysisRecord::new("new", "Just uploaded"));
        gate.notify_one();
        refresh.await.unwrap().unwrap();

        assert_eq!(ids(&store), vec!["new", "a"]);

        backend.set_records(vec![
            AnalysisRecord::new("new", "Just uploaded"),
            AnalysisRecord::new("a", "A"),
        ]);
        store.initialize().await.unwrap();
        assert_eq!(ids(&store), vec!["new", "a"]);
    }

    #[tokio::test]
    async fn test_older_list_response_is_discarded() {
        let (store, backend) = store_with(vec![AnalysisRecord::new("a", "A")]);
        let gate = backend.hold_next_list();

        let slow = {
            let store = store.clone();
            tokio::spawn(async move { store.initialize().await })
        };
        backend.wait_for_list().await;
        backend.set_records(vec![
            AnalysisRecord::new("b", "B"),
            AnalysisRecord::new("a", "A"),
        ]);
        store.initialize().await.unwrap();
        gate.notify_one();
        slow.await.unwrap().unwrap();

        assert_eq!(ids(&store), vec!["b", "a"]);
        assert!(!store.snapshot().loading);
    }

    #[test]
    fn test_just_completed_single_slot() {
        let (store, _) = store_with(vec![]);
        store.add_record(AnalysisRecord::new("a", "A"));
        store.add_record(AnalysisRecord::new("b", "B"));

        store.apply_status_event(&StatusEvent::new("a", Completed, 100));
        store.apply_status_event(&StatusEvent::new("b", Completed, 100));

        assert_eq!(store.consume_just_completed().as_deref(), Some("b"));
        assert_eq!(store.consume_just_completed(), None);
    }

    #[test]
    fn test_just_completed_for_specific_id() {
        let (store, _) = store_with(vec![]);
        store.add_record(AnalysisRecord::new("a", "A"));
        store.apply_status_event(&StatusEvent::new("a", Completed, 100));

        assert!(!store.consume_just_completed_for("b"));
        assert!(store.consume_just_completed_for("a"));
        assert!(!store.consume_just_completed_for("a"));
    }

    #[test]
    fn test_failed_does_not_mark_just_completed() {
        let (store, _) = store_with(vec![]);
        store.add_record(AnalysisRecord::new("a", "A"));
        store.apply_status_event(&StatusEvent::new("a", Failed, 0));
        assert_eq!(store.consume_just_completed(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_mutations() {
        let (store, _) = store_with(vec![]);
        let mut rx = store.subscribe();

        store.add_record(AnalysisRecord::new("a", "A"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().records.len(), 1);

        store.apply_status_event(&StatusEvent::new("a", Processing, 12));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().records[0].progress, 12);
    }

    #[test]
    fn test_independent_stores_do_not_share_state() {
        let (first, _) = store_with(vec![]);
        let (second, _) = store_with(vec![]);
        first.add_record(AnalysisRecord::new("a", "A"));
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }
}
