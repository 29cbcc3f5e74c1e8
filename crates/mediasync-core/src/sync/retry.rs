//! Retry of pending ledger events
//!
//! Runs before anything new is fetched, so older failures are always
//! attempted before newer remote events.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::applier::ContentApplier;
use crate::error::{SyncError, SyncResult};
use crate::remote::ConnectivityProbe;
use crate::storage::EventLedger;
use crate::types::{ContentId, EventId};

/// Result of replaying pending events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    /// Pending events found in the ledger
    pub attempted: usize,
    /// Of those, how many are now succeeded
    pub recovered: usize,
    /// Whether any recovered event changed the catalog or files
    pub changed: bool,
    /// Events that are still pending after this pass
    pub still_pending: HashSet<EventId>,
}

impl RetryOutcome {
    /// Whether there was anything to replay.
    pub fn did_apply_anything(&self) -> bool {
        self.attempted > 0
    }
}

/// Replays every unsucceeded ledger event through the applier
pub struct RetryManager {
    ledger: Arc<dyn EventLedger>,
    probe: Arc<dyn ConnectivityProbe>,
    applier: Arc<ContentApplier>,
}

impl RetryManager {
    pub fn new(
        ledger: Arc<dyn EventLedger>,
        probe: Arc<dyn ConnectivityProbe>,
        applier: Arc<ContentApplier>,
    ) -> Self {
        Self {
            ledger,
            probe,
            applier,
        }
    }

    /// Replay pending events one at a time.
    ///
    /// Fails with [`SyncError::NoConnectivity`] when offline. Once an event
    /// fails, later pending events for the same content are held back so
    /// they cannot overtake it.
    pub async fn retry_local(&self) -> SyncResult<RetryOutcome> {
        let mut pending = self.ledger.unsuccessful_events()?;

        if !self.probe.has_connectivity().await {
            return Err(SyncError::NoConnectivity(
                "cannot retry pending events while offline".to_string(),
            ));
        }

        if pending.is_empty() {
            debug!("No pending events to retry");
            return Ok(RetryOutcome::default());
        }

        pending.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        info!(count = pending.len(), "Retrying pending events");

        let mut outcome = RetryOutcome {
            attempted: pending.len(),
            ..RetryOutcome::default()
        };
        let mut blocked: HashSet<ContentId> = HashSet::new();

        for event in &pending {
            if blocked.contains(&event.content_id) {
                outcome.still_pending.insert(event.id.clone());
                continue;
            }
            match self.applier.apply(event).await {
                Ok(applied) => {
                    outcome.recovered += 1;
                    outcome.changed |= applied.changed_anything();
                }
                Err(e) => {
                    warn!(
                        event_id = %event.id,
                        content_id = %event.content_id,
                        error = %e,
                        "Retry failed, event stays pending"
                    );
                    blocked.insert(event.content_id.clone());
                    outcome.still_pending.insert(event.id.clone());
                }
            }
        }

        Ok(outcome)
    }
}
