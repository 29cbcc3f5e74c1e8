//! Persistent storage using redb.
//!
//! This module provides ACID-compliant storage for:
//! - The event ledger (every update event seen, with its success flag)
//! - The sync checkpoint (resume point for the next fetch)
//! - The local catalog (sound, song and author metadata)
//!
//! The engine talks to storage through the [`EventLedger`], [`CheckpointStore`]
//! and [`MetadataStore`] traits so that tests can substitute the in-memory
//! versions from [`crate::memory`].

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use redb::Database;

use crate::error::SyncError;
use crate::types::{Checkpoint, ContentId, ContentRecord, EventId, MediaKind, UpdateEvent};

// Submodules
mod catalog;
mod checkpoint;
mod ledger;

use catalog::{AUTHORS_TABLE, SONGS_TABLE, SOUNDS_TABLE};
use checkpoint::SYNC_STATE_TABLE;
use ledger::EVENTS_TABLE;

/// Durable log of every update event seen by this client.
pub trait EventLedger: Send + Sync {
    /// Whether an event with this id was ever recorded.
    fn exists(&self, id: &EventId) -> Result<bool, SyncError>;

    /// Record a new event. Fails with [`SyncError::LedgerConflict`] if the
    /// id is already present; callers check [`exists`](Self::exists) first.
    fn insert(&self, event: &UpdateEvent) -> Result<(), SyncError>;

    /// Flip the success flag of a recorded event.
    fn mark_succeeded(&self, id: &EventId) -> Result<(), SyncError>;

    /// Every recorded event whose success flag is still `false`.
    fn unsuccessful_events(&self) -> Result<Vec<UpdateEvent>, SyncError>;

    /// Look up a single event.
    fn get(&self, id: &EventId) -> Result<Option<UpdateEvent>, SyncError>;

    /// Every recorded event, ordered by `occurred_at`.
    fn all_events(&self) -> Result<Vec<UpdateEvent>, SyncError>;

    /// Resume point derived from the ledger's own rows.
    ///
    /// The newest succeeded event that is older than every pending event.
    /// Pending events are therefore always re-requested.
    fn last_known_checkpoint(&self) -> Result<Checkpoint, SyncError> {
        let events = self.all_events()?;
        let first_pending = events
            .iter()
            .filter(|e| !e.succeeded)
            .map(|e| e.occurred_at)
            .min();

        let boundary = events
            .iter()
            .filter(|e| e.succeeded)
            .filter(|e| first_pending.map_or(true, |p| e.occurred_at < p))
            .map(|e| e.occurred_at)
            .max();

        Ok(boundary.map_or(Checkpoint::All, Checkpoint::At))
    }
}

/// Single durable value: the timestamp of the last fully absorbed event.
pub trait CheckpointStore: Send + Sync {
    fn read_checkpoint(&self) -> Result<Checkpoint, SyncError>;
    fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SyncError>;
}

/// Local catalog of mirrored metadata.
pub trait MetadataStore: Send + Sync {
    fn insert_entity(&self, record: &ContentRecord) -> Result<(), SyncError>;

    /// Replace an existing row. Fails with [`SyncError::NotFound`] if absent.
    fn update_entity(&self, record: &ContentRecord) -> Result<(), SyncError>;

    /// Remove a row. Returns whether a row was removed.
    fn delete_entity(&self, kind: MediaKind, id: &ContentId) -> Result<bool, SyncError>;

    fn entity_exists(&self, kind: MediaKind, id: &ContentId) -> Result<bool, SyncError>;

    fn get_entity(&self, kind: MediaKind, id: &ContentId)
        -> Result<Option<ContentRecord>, SyncError>;

    fn list_entities(&self, kind: MediaKind) -> Result<Vec<ContentRecord>, SyncError>;
}

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(EVENTS_TABLE)?;
            let _ = write_txn.open_table(SYNC_STATE_TABLE)?;
            let _ = write_txn.open_table(SOUNDS_TABLE)?;
            let _ = write_txn.open_table(SONGS_TABLE)?;
            let _ = write_txn.open_table(AUTHORS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }
}
