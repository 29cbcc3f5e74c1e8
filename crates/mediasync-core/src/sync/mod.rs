//! Content synchronization
//!
//! ## Overview
//!
//! The server publishes an ordered log of update events. Each run replays
//! whatever failed last time, fetches what happened since the checkpoint,
//! applies it in order and moves the checkpoint forward once the whole batch
//! is absorbed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SyncService (orchestrator)                                     │
//! │  ├── RetryManager: replays pending ledger events first          │
//! │  ├── EventSource: events since the checkpoint                   │
//! │  ├── EventLedger: idempotent record of every event              │
//! │  ├── ContentApplier: one event → catalog + file mutations       │
//! │  └── CheckpointStore: advanced after a fully absorbed batch     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod applier;
pub mod events;
pub mod orchestrator;
pub mod retry;

pub use applier::ContentApplier;
pub use events::{ApplyOutcome, SyncEvent, SyncFailure, SyncReport, SyncStatus};
pub use orchestrator::{normalize_batch, Collaborators, ProgressCallback, SyncService};
pub use retry::{RetryManager, RetryOutcome};
