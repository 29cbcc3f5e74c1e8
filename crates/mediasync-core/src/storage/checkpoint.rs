//! Sync checkpoint
//!
//! The checkpoint lives in its own table and is the single source of truth
//! for the resume point. When it has never been written (fresh database, or
//! a ledger carried over from an older install) it falls back to the
//! boundary derived from the ledger.

use redb::{ReadableTable, TableDefinition};

use super::{CheckpointStore, EventLedger, Storage};
use crate::error::SyncError;
use crate::types::Checkpoint;

/// Table for scalar sync state (key: name, value: string)
pub(crate) const SYNC_STATE_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("sync_state");

const LAST_UPDATE_KEY: &str = "last_update";

impl CheckpointStore for Storage {
    fn read_checkpoint(&self) -> Result<Checkpoint, SyncError> {
        let stored = {
            let db = self.db.read();
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(SYNC_STATE_TABLE)?;
            let value = table.get(LAST_UPDATE_KEY)?.map(|v| v.value().to_string());
            value
        };

        match stored {
            Some(value) => value.parse(),
            None => self.last_known_checkpoint(),
        }
    }

    fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYNC_STATE_TABLE)?;
            let value = checkpoint.to_string();
            table.insert(LAST_UPDATE_KEY, value.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
