//! ContentMirror - the primary entry point for hosts
//!
//! ContentMirror wires the production collaborators together:
//! - [`Storage`] (redb) as ledger, checkpoint and catalog
//! - [`HttpEventSource`] as event source and connectivity probe
//! - [`FsFileManager`] for media files
//!
//! # Example
//!
//! ```ignore
//! use mediasync_core::{ContentMirror, SyncConfig};
//!
//! let mirror = ContentMirror::open(SyncConfig::load_from_dir("~/.mediasync")?)?;
//! let report = mirror.sync().await;
//! println!("{} ({} pending)", report.status, report.pending);
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::files::FsFileManager;
use crate::remote::HttpEventSource;
use crate::storage::{CheckpointStore, EventLedger, MetadataStore, Storage};
use crate::sync::{
    Collaborators, ProgressCallback, SyncEvent, SyncReport, SyncService, SyncStatus,
};
use crate::types::{Checkpoint, ContentRecord, MediaKind, UpdateEvent};

/// Snapshot of local sync state
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorInfo {
    pub data_dir: PathBuf,
    pub server_url: String,
    pub checkpoint: Checkpoint,
    pub total_events: usize,
    pub pending_events: usize,
    pub sounds: usize,
    pub songs: usize,
    pub authors: usize,
}

/// Local mirror of the remote media catalog
pub struct ContentMirror {
    config: SyncConfig,
    storage: Storage,
    files: Arc<FsFileManager>,
    service: SyncService,
}

impl ContentMirror {
    /// Open the mirror described by `config`.
    ///
    /// Creates the data directory and database if needed. No network
    /// request is made until [`sync`](Self::sync).
    pub fn open(config: SyncConfig) -> Result<Self, SyncError> {
        info!(data_dir = ?config.data_dir, "Opening content mirror");
        std::fs::create_dir_all(&config.data_dir)?;

        let storage = Storage::new(config.database_path())?;
        let remote = Arc::new(HttpEventSource::new(&config)?);
        let files = Arc::new(FsFileManager::new(&config)?);
        let shared = Arc::new(storage.clone());

        let service = SyncService::new(Collaborators {
            ledger: shared.clone(),
            checkpoints: shared.clone(),
            catalog: shared,
            files: files.clone(),
            source: remote.clone(),
            probe: remote,
        });

        Ok(Self {
            config,
            storage,
            files,
            service,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn files(&self) -> &FsFileManager {
        &self.files
    }

    pub async fn sync(&self) -> SyncReport {
        self.service.run_sync().await
    }

    pub async fn sync_with_progress(&self, progress: ProgressCallback<'_>) -> SyncReport {
        self.service.run_sync_with_progress(progress).await
    }

    pub fn status(&self) -> SyncStatus {
        self.service.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.service.subscribe()
    }

    pub fn checkpoint(&self) -> Result<Checkpoint, SyncError> {
        self.storage.read_checkpoint()
    }

    /// Ledger rows, oldest first, optionally only the pending ones.
    pub fn events(&self, pending_only: bool) -> Result<Vec<UpdateEvent>, SyncError> {
        let events = self.storage.all_events()?;
        Ok(if pending_only {
            events.into_iter().filter(|e| !e.succeeded).collect()
        } else {
            events
        })
    }

    pub fn catalog(&self, kind: MediaKind) -> Result<Vec<ContentRecord>, SyncError> {
        self.storage.list_entities(kind)
    }

    pub fn info(&self) -> Result<MirrorInfo, SyncError> {
        let events = self.storage.all_events()?;
        Ok(MirrorInfo {
            data_dir: self.config.data_dir.clone(),
            server_url: self.config.server_base(),
            checkpoint: self.checkpoint()?,
            total_events: events.len(),
            pending_events: events.iter().filter(|e| !e.succeeded).count(),
            sounds: self.storage.list_entities(MediaKind::Sound)?.len(),
            songs: self.storage.list_entities(MediaKind::Song)?.len(),
            authors: self.storage.list_entities(MediaKind::Author)?.len(),
        })
    }
}
