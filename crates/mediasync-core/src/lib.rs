//! Media Sync Core Library
//!
//! Client-side mirror of a remote media catalog (sounds, songs, authors).
//!
//! ## Overview
//!
//! The server owns the catalog and publishes every change as an ordered
//! update event. This crate keeps a local copy consistent with it:
//!
//! - **Ordered**: events are applied in `occurred_at` order
//! - **Idempotent**: every event id is recorded in a ledger and applied once
//! - **Resumable**: failed events stay pending and are retried first on the
//!   next run; the checkpoint only moves past a fully absorbed batch
//!
//! ## Quick Start
//!
//! ```ignore
//! use mediasync_core::{ContentMirror, SyncConfig, SyncStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mirror = ContentMirror::open(SyncConfig::default())?;
//!
//!     let report = mirror
//!         .sync_with_progress(&mut |status: SyncStatus| println!("{status}"))
//!         .await;
//!
//!     println!("checkpoint: {}", report.checkpoint);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod files;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod remote;
pub mod storage;
pub mod sync;
pub mod types;

// Re-exports
pub use config::SyncConfig;
pub use engine::{ContentMirror, MirrorInfo};
pub use error::{SyncError, SyncResult};
pub use files::{FileManager, FsFileManager};
pub use remote::{ConnectivityProbe, EventSource, HttpEventSource};
pub use storage::{CheckpointStore, EventLedger, MetadataStore, Storage};
pub use sync::{
    ApplyOutcome, Collaborators, ContentApplier, RetryManager, RetryOutcome, SyncEvent,
    SyncFailure, SyncReport, SyncService, SyncStatus,
};
pub use types::*;
