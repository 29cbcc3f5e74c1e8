//! Sync orchestrator
//!
//! One run walks these states:
//!
//! ```text
//! Idle → Retrying → Fetching → Applying → Advancing → Done
//!            │          │          │
//!            └──────────┴──────────┴──→ Failed (UpdateError)
//! ```
//!
//! - **Retrying**: pending ledger events are replayed (offline aborts here)
//! - **Fetching**: events after the checkpoint are requested
//! - **Applying**: new events are recorded, then applied in `occurred_at`
//!   order; the batch stops at the first event that fails
//! - **Advancing**: when the whole batch succeeded, the checkpoint moves to
//!   the last event's timestamp
//!
//! Connectivity, fetch, ledger-conflict and storage errors end the run with
//! `UpdateError`. Succeeded events keep their flag; the checkpoint stays put.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::applier::ContentApplier;
use super::events::{SyncEvent, SyncReport, SyncStatus};
use super::retry::RetryManager;
use crate::error::{SyncError, SyncResult};
use crate::files::FileManager;
use crate::remote::{ConnectivityProbe, EventSource};
use crate::storage::{CheckpointStore, EventLedger, MetadataStore};
use crate::types::{Checkpoint, UpdateEvent};

/// Default capacity for the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything the orchestrator depends on
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn EventLedger>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub catalog: Arc<dyn MetadataStore>,
    pub files: Arc<dyn FileManager>,
    pub source: Arc<dyn EventSource>,
    pub probe: Arc<dyn ConnectivityProbe>,
}

/// Progress callback, invoked with every status transition of a run
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(SyncStatus) + Send);

/// Counters gathered while a run succeeds
struct RunSummary {
    retried: usize,
    recovered: usize,
    applied: usize,
    skipped: usize,
    changed: bool,
    complete: bool,
    checkpoint: Checkpoint,
}

/// Top-level sync control loop
///
/// # Example
///
/// ```ignore
/// let service = SyncService::new(collaborators);
/// let mut events = service.subscribe();
///
/// let report = service.run_sync().await;
/// if report.changed {
///     // refresh the catalog views
/// }
/// ```
pub struct SyncService {
    ledger: Arc<dyn EventLedger>,
    checkpoints: Arc<dyn CheckpointStore>,
    source: Arc<dyn EventSource>,
    applier: Arc<ContentApplier>,
    retry: RetryManager,
    /// Latest status, for hosts that poll instead of subscribing
    status: Mutex<SyncStatus>,
    event_tx: broadcast::Sender<SyncEvent>,
    /// Serializes runs; the ledger and checkpoint are owned by one run at a time
    run_lock: tokio::sync::Mutex<()>,
}

impl SyncService {
    pub fn new(deps: Collaborators) -> Self {
        let applier = Arc::new(ContentApplier::new(
            deps.ledger.clone(),
            deps.catalog.clone(),
            deps.files.clone(),
            deps.source.clone(),
        ));
        let retry = RetryManager::new(deps.ledger.clone(), deps.probe.clone(), applier.clone());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            ledger: deps.ledger,
            checkpoints: deps.checkpoints,
            source: deps.source,
            applier,
            retry,
            status: Mutex::new(SyncStatus::PendingFirstUpdate),
            event_tx,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Subscribe to sync events
    ///
    /// Multiple subscribers can exist; events are broadcast to all.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Most recent status
    pub fn status(&self) -> SyncStatus {
        *self.status.lock()
    }

    /// Run one sync.
    pub async fn run_sync(&self) -> SyncReport {
        let mut ignore = |_: SyncStatus| {};
        self.run_sync_with_progress(&mut ignore).await
    }

    /// Run one sync, reporting every status transition to `progress`.
    pub async fn run_sync_with_progress(&self, progress: ProgressCallback<'_>) -> SyncReport {
        let _guard = self.run_lock.lock().await;

        self.set_status(SyncStatus::Updating { current: 0, total: 0 }, progress);
        info!("Starting content sync");

        match self.execute(progress).await {
            Ok(summary) => {
                let checkpoint = summary.checkpoint;
                let pending = self.pending_count();
                self.set_status(SyncStatus::Done, progress);
                info!(
                    applied = summary.applied,
                    recovered = summary.recovered,
                    pending,
                    %checkpoint,
                    "Content sync finished"
                );
                SyncReport {
                    status: SyncStatus::Done,
                    changed: summary.changed,
                    complete: summary.complete,
                    retried: summary.retried,
                    recovered: summary.recovered,
                    applied: summary.applied,
                    skipped: summary.skipped,
                    pending,
                    checkpoint,
                }
            }
            Err(e) => {
                let failure = e.failure_kind();
                match &e {
                    SyncError::LedgerConflict { event_id } => {
                        error!(
                            %event_id,
                            "Data integrity anomaly: duplicate event id in ledger"
                        );
                    }
                    other => warn!(error = %other, %failure, "Content sync failed"),
                }
                let status = SyncStatus::UpdateError(failure);
                self.set_status(status, progress);
                let checkpoint = match self.checkpoints.read_checkpoint() {
                    Ok(checkpoint) => checkpoint,
                    Err(read_err) => {
                        warn!(error = %read_err, "Could not read checkpoint for the report");
                        Checkpoint::All
                    }
                };
                let mut report = SyncReport::failed(failure, checkpoint);
                report.pending = self.pending_count();
                report
            }
        }
    }

    async fn execute(&self, progress: ProgressCallback<'_>) -> SyncResult<RunSummary> {
        // Retrying
        let retried = self.retry.retry_local().await?;

        // Fetching
        let checkpoint = self.checkpoints.read_checkpoint()?;
        debug!(%checkpoint, "Fetching events");
        let batch = normalize_batch(self.source.fetch_events(&checkpoint).await?);

        // Applying
        for event in &batch {
            if self.ledger.exists(&event.id)? {
                continue;
            }
            self.ledger.insert(event)?;
        }

        let total = batch.len();
        let mut applied = 0;
        let mut skipped = 0;
        let mut changed = retried.changed;
        let mut complete = true;

        for (index, event) in batch.iter().enumerate() {
            if retried.still_pending.contains(&event.id) {
                debug!(event_id = %event.id, "Event failed its retry this run, stopping batch");
                complete = false;
                break;
            }

            let recorded = self.ledger.get(&event.id)?;
            if recorded.map_or(false, |e| e.succeeded) {
                skipped += 1;
            } else {
                match self.applier.apply(event).await {
                    Ok(outcome) => {
                        applied += 1;
                        changed |= outcome.changed_anything();
                        let _ = self.event_tx.send(SyncEvent::EventApplied {
                            event_id: event.id.clone(),
                            outcome,
                        });
                    }
                    Err(e) => {
                        warn!(
                            event_id = %event.id,
                            content_id = %event.content_id,
                            error = %e,
                            "Event failed, stopping batch"
                        );
                        let _ = self.event_tx.send(SyncEvent::EventFailed {
                            event_id: event.id.clone(),
                            message: e.to_string(),
                        });
                        complete = false;
                        break;
                    }
                }
            }

            self.set_status(
                SyncStatus::Updating {
                    current: index + 1,
                    total,
                },
                progress,
            );
        }

        // Advancing
        let mut reached = checkpoint;
        if complete {
            if let Some(last) = batch.last() {
                let next = Checkpoint::At(last.occurred_at);
                if next > checkpoint {
                    self.checkpoints.write_checkpoint(&next)?;
                    debug!(checkpoint = %next, "Checkpoint advanced");
                    reached = next;
                }
            }
        }

        Ok(RunSummary {
            retried: retried.attempted,
            recovered: retried.recovered,
            applied,
            skipped,
            changed,
            complete,
            checkpoint: reached,
        })
    }

    /// Pending ledger events, for the report.
    fn pending_count(&self) -> usize {
        match self.ledger.unsuccessful_events() {
            Ok(events) => events.len(),
            Err(e) => {
                warn!(error = %e, "Could not count pending events for the report");
                0
            }
        }
    }

    fn set_status(&self, status: SyncStatus, progress: ProgressCallback<'_>) {
        *self.status.lock() = status;
        progress(status);
        let _ = self.event_tx.send(SyncEvent::StatusChanged(status));
    }
}

/// Order a fetched batch by `occurred_at` and drop repeated ids.
///
/// The sort is stable, so events sharing a timestamp keep server order.
pub fn normalize_batch(mut events: Vec<UpdateEvent>) -> Vec<UpdateEvent> {
    events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
    let mut seen = HashSet::new();
    events.retain(|e| seen.insert(e.id.clone()));
    events
}
