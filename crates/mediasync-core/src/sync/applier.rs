//! Content applier
//!
//! Applies one update event to the local catalog and media files, then marks
//! it succeeded in the ledger. Dispatch is on `(media kind, change kind)`:
//!
//! | change          | sound / song                          | author            |
//! |-----------------|---------------------------------------|-------------------|
//! | created         | skip if row exists, else insert + file | insert row        |
//! | metadataUpdated | update row                            | update row        |
//! | fileUpdated     | re-download file                      | ignored (no file) |
//! | deleted         | delete row + file                     | delete row        |
//!
//! Any error leaves the event unmarked so the next run retries it.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::events::ApplyOutcome;
use crate::error::{SyncError, SyncResult};
use crate::files::FileManager;
use crate::remote::EventSource;
use crate::storage::{EventLedger, MetadataStore};
use crate::types::{ChangeKind, ContentId, MediaKind, UpdateEvent};

/// Translates update events into catalog and file mutations
pub struct ContentApplier {
    ledger: Arc<dyn EventLedger>,
    catalog: Arc<dyn MetadataStore>,
    files: Arc<dyn FileManager>,
    source: Arc<dyn EventSource>,
}

impl ContentApplier {
    pub fn new(
        ledger: Arc<dyn EventLedger>,
        catalog: Arc<dyn MetadataStore>,
        files: Arc<dyn FileManager>,
        source: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            files,
            source,
        }
    }

    /// Apply one event and mark it succeeded.
    ///
    /// The event must already be recorded in the ledger.
    pub async fn apply(&self, event: &UpdateEvent) -> SyncResult<ApplyOutcome> {
        let outcome = self.apply_change(event).await?;
        self.ledger.mark_succeeded(&event.id)?;
        debug!(
            event_id = %event.id,
            content_id = %event.content_id,
            media = %event.media_type,
            change = %event.event_type,
            ?outcome,
            "Applied update event"
        );
        Ok(outcome)
    }

    async fn apply_change(&self, event: &UpdateEvent) -> SyncResult<ApplyOutcome> {
        let id = &event.content_id;
        match (event.media_type, event.event_type) {
            (kind @ (MediaKind::Sound | MediaKind::Song), ChangeKind::Created) => {
                self.create_with_file(kind, id).await
            }
            (MediaKind::Author, ChangeKind::Created) => {
                self.insert_metadata(MediaKind::Author, id).await
            }
            (kind, ChangeKind::MetadataUpdated) => self.update_metadata(kind, id).await,
            (kind @ (MediaKind::Sound | MediaKind::Song), ChangeKind::FileUpdated) => {
                self.files.download_file(kind, id).await?;
                Ok(ApplyOutcome::Applied)
            }
            (MediaKind::Author, ChangeKind::FileUpdated) => {
                warn!(
                    event_id = %event.id,
                    content_id = %id,
                    "Ignoring fileUpdated event for an author"
                );
                Ok(ApplyOutcome::Ignored)
            }
            (kind @ (MediaKind::Sound | MediaKind::Song), ChangeKind::Deleted) => {
                self.catalog.delete_entity(kind, id)?;
                self.files.remove_file(kind, id).await?;
                Ok(ApplyOutcome::Applied)
            }
            (MediaKind::Author, ChangeKind::Deleted) => {
                self.catalog.delete_entity(MediaKind::Author, id)?;
                Ok(ApplyOutcome::Applied)
            }
        }
    }

    /// An existing row means an earlier delivery already got past the
    /// insert, so the download is skipped as well.
    async fn create_with_file(&self, kind: MediaKind, id: &ContentId) -> SyncResult<ApplyOutcome> {
        if self.catalog.entity_exists(kind, id)? {
            debug!(content_id = %id, media = %kind, "Content already present, skipping");
            return Ok(ApplyOutcome::AlreadyApplied);
        }
        let record = self.source.fetch_content(kind, id).await?;
        self.catalog.insert_entity(&record)?;
        if let Err(e) = self.files.download_file(kind, id).await {
            warn!(
                content_id = %id,
                media = %kind,
                error = %e,
                "Download failed, removing new row"
            );
            // Without the row removed, the retry would see the row and
            // skip the download for good.
            if let Err(rollback) = self.catalog.delete_entity(kind, id) {
                error!(
                    content_id = %id,
                    media = %kind,
                    error = %rollback,
                    "Row removal failed"
                );
                return Err(SyncError::Storage(format!(
                    "removing {kind} {id} after failed download ({e}): {rollback}"
                )));
            }
            return Err(e);
        }
        Ok(ApplyOutcome::Applied)
    }

    async fn insert_metadata(&self, kind: MediaKind, id: &ContentId) -> SyncResult<ApplyOutcome> {
        let record = self.source.fetch_content(kind, id).await?;
        self.catalog.insert_entity(&record)?;
        Ok(ApplyOutcome::Applied)
    }

    async fn update_metadata(&self, kind: MediaKind, id: &ContentId) -> SyncResult<ApplyOutcome> {
        let record = self.source.fetch_content(kind, id).await?;
        if self.catalog.entity_exists(kind, id)? {
            self.catalog.update_entity(&record)?;
        } else {
            warn!(
                content_id = %id,
                media = %kind,
                "Metadata update for unknown content, inserting"
            );
            self.catalog.insert_entity(&record)?;
        }
        Ok(ApplyOutcome::Applied)
    }
}
