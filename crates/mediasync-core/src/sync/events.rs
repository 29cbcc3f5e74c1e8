//! Sync status and event types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SyncStatus: what the host application displays                 │
//! │  ├── PendingFirstUpdate: no run has happened yet                │
//! │  ├── Updating: a run is in progress (current/total)             │
//! │  ├── Done: the last run finished                                │
//! │  └── UpdateError: the last run aborted (classified)             │
//! │                                                                 │
//! │  SyncEvent: notifications broadcast during a run                │
//! │  ├── StatusChanged: a status transition                         │
//! │  ├── EventApplied: one update event was absorbed                │
//! │  └── EventFailed: one update event stays pending                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::types::{Checkpoint, EventId};

/// Why a run aborted.
///
/// Kept separate from the error message so telemetry can tell "offline"
/// apart from "corrupt state".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFailure {
    /// No network; nothing was mutated
    Connectivity,
    /// The server was reachable but a request failed
    RemoteFetch,
    /// An event id collided in the ledger despite the existence check
    LedgerConflict,
    /// Local database or filesystem failure
    Storage,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncFailure::Connectivity => "no connectivity",
            SyncFailure::RemoteFetch => "remote fetch failed",
            SyncFailure::LedgerConflict => "ledger conflict",
            SyncFailure::Storage => "storage failure",
        };
        f.write_str(s)
    }
}

/// Status of the content sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// No sync has run yet
    #[default]
    PendingFirstUpdate,
    /// A run is in progress
    Updating {
        /// Events processed so far in the current batch
        current: usize,
        /// Events in the current batch (0 until the batch is known)
        total: usize,
    },
    /// The last run finished
    Done,
    /// The last run aborted
    UpdateError(SyncFailure),
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Done | SyncStatus::UpdateError(_))
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::PendingFirstUpdate => write!(f, "Pending first update"),
            SyncStatus::Updating { total: 0, .. } => write!(f, "Updating"),
            SyncStatus::Updating { current, total } => {
                write!(f, "Updating ({}/{})", current, total)
            }
            SyncStatus::Done => write!(f, "Done"),
            SyncStatus::UpdateError(failure) => write!(f, "Update error: {}", failure),
        }
    }
}

/// How an update event was absorbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Local metadata and/or files were changed
    Applied,
    /// The effects were already present (re-delivered `created`)
    AlreadyApplied,
    /// Invalid combination; recorded as succeeded without doing anything
    Ignored,
}

impl ApplyOutcome {
    pub fn changed_anything(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// Events emitted during synchronization
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Sync status changed
    StatusChanged(SyncStatus),
    /// An update event was absorbed and marked succeeded
    EventApplied {
        event_id: EventId,
        outcome: ApplyOutcome,
    },
    /// An update event could not be applied and stays pending
    EventFailed { event_id: EventId, message: String },
}

/// Summary of one sync run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Terminal status (`Done` or `UpdateError`)
    pub status: SyncStatus,
    /// Whether the local catalog changed; a hint for refreshing views
    pub changed: bool,
    /// Whether every fetched event is now succeeded
    pub complete: bool,
    /// Pending events replayed before fetching
    pub retried: usize,
    /// Of those, how many succeeded
    pub recovered: usize,
    /// Fetched events applied in this run
    pub applied: usize,
    /// Fetched events already succeeded from a prior run
    pub skipped: usize,
    /// Events still pending in the ledger after the run
    pub pending: usize,
    /// Checkpoint after the run
    pub checkpoint: Checkpoint,
}

impl SyncReport {
    pub(crate) fn failed(failure: SyncFailure, checkpoint: Checkpoint) -> Self {
        Self {
            status: SyncStatus::UpdateError(failure),
            changed: false,
            complete: false,
            retried: 0,
            recovered: 0,
            applied: 0,
            skipped: 0,
            pending: 0,
            checkpoint,
        }
    }
}
