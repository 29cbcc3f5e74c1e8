//! In-memory collaborators
//!
//! Drop-in implementations of every trait the sync engine consumes, with
//! knobs for injecting failures. Only built for tests or with the
//! `test-util` feature; real runs use [`crate::storage::Storage`],
//! [`crate::remote::HttpEventSource`] and [`crate::files::FsFileManager`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{SyncError, SyncResult};
use crate::files::FileManager;
use crate::remote::{ConnectivityProbe, EventSource};
use crate::storage::{CheckpointStore, EventLedger, MetadataStore};
use crate::types::{
    Author, Checkpoint, ContentId, ContentRecord, EventId, MediaKind, Song, Sound, UpdateEvent,
};

/// Event ledger held in a map
#[derive(Debug, Default)]
pub struct MemoryLedger {
    events: Mutex<BTreeMap<EventId, UpdateEvent>>,
    hidden: Mutex<HashSet<EventId>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `exists` report `false` for an id that is actually present,
    /// as a concurrent writer or storage bug would.
    pub fn hide_from_exists(&self, id: &EventId) {
        self.hidden.lock().insert(id.clone());
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventLedger for MemoryLedger {
    fn exists(&self, id: &EventId) -> Result<bool, SyncError> {
        if self.hidden.lock().contains(id) {
            return Ok(false);
        }
        Ok(self.events.lock().contains_key(id))
    }

    fn insert(&self, event: &UpdateEvent) -> Result<(), SyncError> {
        let mut events = self.events.lock();
        if events.contains_key(&event.id) {
            return Err(SyncError::LedgerConflict {
                event_id: event.id.clone(),
            });
        }
        events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    fn mark_succeeded(&self, id: &EventId) -> Result<(), SyncError> {
        match self.events.lock().get_mut(id) {
            Some(event) => {
                event.succeeded = true;
                Ok(())
            }
            None => Err(SyncError::NotFound(format!("event {id}"))),
        }
    }

    fn unsuccessful_events(&self) -> Result<Vec<UpdateEvent>, SyncError> {
        Ok(self
            .events
            .lock()
            .values()
            .filter(|e| !e.succeeded)
            .cloned()
            .collect())
    }

    fn get(&self, id: &EventId) -> Result<Option<UpdateEvent>, SyncError> {
        Ok(self.events.lock().get(id).cloned())
    }

    fn all_events(&self) -> Result<Vec<UpdateEvent>, SyncError> {
        let mut events: Vec<_> = self.events.lock().values().cloned().collect();
        events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(events)
    }
}

/// Checkpoint held in memory, counting writes
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    value: Mutex<Checkpoint>,
    writes: Mutex<usize>,
}

impl MemoryCheckpoint {
    pub fn new(initial: Checkpoint) -> Self {
        Self {
            value: Mutex::new(initial),
            writes: Mutex::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn read_checkpoint(&self) -> Result<Checkpoint, SyncError> {
        Ok(*self.value.lock())
    }

    fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SyncError> {
        *self.value.lock() = *checkpoint;
        *self.writes.lock() += 1;
        Ok(())
    }
}

/// Local catalog held in a map
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: Mutex<HashMap<(MediaKind, ContentId), ContentRecord>>,
    inserts: Mutex<usize>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `insert_entity` calls made so far.
    pub fn inserts(&self) -> usize {
        *self.inserts.lock()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl MetadataStore for MemoryCatalog {
    fn insert_entity(&self, record: &ContentRecord) -> Result<(), SyncError> {
        self.records
            .lock()
            .insert((record.kind(), record.id().clone()), record.clone());
        *self.inserts.lock() += 1;
        Ok(())
    }

    fn update_entity(&self, record: &ContentRecord) -> Result<(), SyncError> {
        let mut records = self.records.lock();
        let key = (record.kind(), record.id().clone());
        match records.get_mut(&key) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(SyncError::NotFound(format!(
                "{} {}",
                record.kind(),
                record.id()
            ))),
        }
    }

    fn delete_entity(&self, kind: MediaKind, id: &ContentId) -> Result<bool, SyncError> {
        Ok(self.records.lock().remove(&(kind, id.clone())).is_some())
    }

    fn entity_exists(&self, kind: MediaKind, id: &ContentId) -> Result<bool, SyncError> {
        Ok(self.records.lock().contains_key(&(kind, id.clone())))
    }

    fn get_entity(
        &self,
        kind: MediaKind,
        id: &ContentId,
    ) -> Result<Option<ContentRecord>, SyncError> {
        Ok(self.records.lock().get(&(kind, id.clone())).cloned())
    }

    fn list_entities(&self, kind: MediaKind) -> Result<Vec<ContentRecord>, SyncError> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .values()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(records)
    }
}

/// File manager that records calls instead of touching disk
#[derive(Debug, Default)]
pub struct MemoryFiles {
    stored: Mutex<HashSet<(MediaKind, ContentId)>>,
    downloads: Mutex<Vec<(MediaKind, ContentId)>>,
    removals: Mutex<Vec<(MediaKind, ContentId)>>,
    failing: Mutex<HashSet<ContentId>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make downloads of this content fail until [`clear_failures`](Self::clear_failures).
    pub fn fail_downloads_for(&self, id: &ContentId) {
        self.failing.lock().insert(id.clone());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn has_file(&self, kind: MediaKind, id: &ContentId) -> bool {
        self.stored.lock().contains(&(kind, id.clone()))
    }

    /// Every download attempted, successful or not, in call order.
    pub fn downloads(&self) -> Vec<(MediaKind, ContentId)> {
        self.downloads.lock().clone()
    }

    pub fn removals(&self) -> Vec<(MediaKind, ContentId)> {
        self.removals.lock().clone()
    }

    /// Total file manager calls of any kind.
    pub fn calls(&self) -> usize {
        self.downloads.lock().len() + self.removals.lock().len()
    }
}

#[async_trait]
impl FileManager for MemoryFiles {
    async fn download_file(&self, kind: MediaKind, id: &ContentId) -> SyncResult<()> {
        self.downloads.lock().push((kind, id.clone()));
        if !kind.has_file() {
            return Err(SyncError::Download(format!("{kind} entities have no file")));
        }
        if self.failing.lock().contains(id) {
            return Err(SyncError::Download(format!("simulated failure for {id}")));
        }
        self.stored.lock().insert((kind, id.clone()));
        Ok(())
    }

    async fn remove_file(&self, kind: MediaKind, id: &ContentId) -> SyncResult<()> {
        self.removals.lock().push((kind, id.clone()));
        self.stored.lock().remove(&(kind, id.clone()));
        Ok(())
    }
}

/// Server stand-in serving a fixed event log.
///
/// `fetch_events` returns the events strictly after the checkpoint, in the
/// order they were added (tests can add them out of order on purpose).
/// `fetch_content` synthesizes a record unless one was set explicitly.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    events: Mutex<Vec<UpdateEvent>>,
    records: Mutex<HashMap<(MediaKind, ContentId), ContentRecord>>,
    requests: Mutex<Vec<Checkpoint>>,
    fail_fetch: AtomicBool,
}

impl ScriptedSource {
    pub fn new(events: Vec<UpdateEvent>) -> Self {
        Self {
            events: Mutex::new(events),
            ..Self::default()
        }
    }

    pub fn push_event(&self, event: UpdateEvent) {
        self.events.lock().push(event);
    }

    pub fn set_record(&self, record: ContentRecord) {
        self.records
            .lock()
            .insert((record.kind(), record.id().clone()), record);
    }

    /// Make `fetch_events` fail with a server error.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Checkpoints passed to `fetch_events`, in call order.
    pub fn requests(&self) -> Vec<Checkpoint> {
        self.requests.lock().clone()
    }
}

/// A minimal record for content the test did not describe.
pub fn synthetic_record(kind: MediaKind, id: &ContentId) -> ContentRecord {
    match kind {
        MediaKind::Sound => ContentRecord::Sound(Sound {
            id: id.clone(),
            title: format!("Sound {id}"),
            author_id: "author".to_string(),
            description: String::new(),
            date_added: None,
            duration: 1.0,
            is_offensive: false,
        }),
        MediaKind::Song => ContentRecord::Song(Song {
            id: id.clone(),
            title: format!("Song {id}"),
            genre_id: None,
            description: String::new(),
            date_added: None,
            duration: 60.0,
            is_offensive: false,
        }),
        MediaKind::Author => ContentRecord::Author(Author {
            id: id.clone(),
            name: format!("Author {id}"),
            photo: None,
            description: None,
        }),
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn fetch_events(&self, since: &Checkpoint) -> SyncResult<Vec<UpdateEvent>> {
        self.requests.lock().push(*since);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteFetch("HTTP 503".to_string()));
        }
        Ok(self
            .events
            .lock()
            .iter()
            .filter(|e| match since {
                Checkpoint::All => true,
                Checkpoint::At(ts) => e.occurred_at > *ts,
            })
            .cloned()
            .collect())
    }

    async fn fetch_content(&self, kind: MediaKind, id: &ContentId) -> SyncResult<ContentRecord> {
        let explicit = self.records.lock().get(&(kind, id.clone())).cloned();
        Ok(explicit.unwrap_or_else(|| synthetic_record(kind, id)))
    }
}

/// Connectivity switch
#[derive(Debug)]
pub struct StaticConnectivity(AtomicBool);

impl StaticConnectivity {
    pub fn online() -> Self {
        Self(AtomicBool::new(true))
    }

    pub fn offline() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticConnectivity {
    async fn has_connectivity(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeKind;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_scripted_source_filters_by_checkpoint() {
        let t1 = Utc.with_ymd_and_hms(2023, 7, 29, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2023, 7, 30, 0, 0, 0).unwrap();
        let source = ScriptedSource::new(vec![
            UpdateEvent::new("a", "1", MediaKind::Sound, ChangeKind::Created, t1),
            UpdateEvent::new("b", "2", MediaKind::Sound, ChangeKind::Created, t2),
        ]);

        assert_eq!(source.fetch_events(&Checkpoint::All).await.unwrap().len(), 2);
        let after = source.fetch_events(&Checkpoint::At(t1)).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id.as_str(), "b");
        assert_eq!(source.requests(), vec![Checkpoint::All, Checkpoint::At(t1)]);

        let t3 = Utc.with_ymd_and_hms(2023, 7, 31, 0, 0, 0).unwrap();
        source.push_event(UpdateEvent::new("c", "3", MediaKind::Song, ChangeKind::Created, t3));
        let after = source.fetch_events(&Checkpoint::At(t2)).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id.as_str(), "c");
    }

    #[test]
    fn test_hidden_ledger_entry_still_conflicts() {
        let ledger = MemoryLedger::new();
        let event = UpdateEvent::new(
            "a",
            "1",
            MediaKind::Sound,
            ChangeKind::Created,
            Utc.with_ymd_and_hms(2023, 7, 29, 0, 0, 0).unwrap(),
        );
        ledger.insert(&event).unwrap();
        ledger.hide_from_exists(&event.id);

        assert!(!ledger.exists(&event.id).unwrap());
        assert!(matches!(
            ledger.insert(&event),
            Err(SyncError::LedgerConflict { .. })
        ));
    }
}
