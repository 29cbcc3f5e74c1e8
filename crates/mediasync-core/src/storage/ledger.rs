//! Event ledger table
//!
//! Stores every update event keyed by its server-assigned id. Rows are never
//! deleted: they are the idempotency guard against re-delivered events.

use redb::{ReadableTable, TableDefinition};
use tracing::debug;

use super::{EventLedger, Storage};
use crate::error::SyncError;
use crate::types::{EventId, UpdateEvent};

/// Table for the event ledger (key: event id, value: JSON-encoded event)
pub(crate) const EVENTS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("update_events");

fn decode(bytes: &[u8]) -> Result<UpdateEvent, SyncError> {
    serde_json::from_slice(bytes).map_err(|e| SyncError::Serialization(e.to_string()))
}

fn encode(event: &UpdateEvent) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(event).map_err(|e| SyncError::Serialization(e.to_string()))
}

impl EventLedger for Storage {
    fn exists(&self, id: &EventId) -> Result<bool, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        Ok(table.get(id.as_str())?.is_some())
    }

    fn insert(&self, event: &UpdateEvent) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(EVENTS_TABLE)?;
            if table.get(event.id.as_str())?.is_some() {
                return Err(SyncError::LedgerConflict {
                    event_id: event.id.clone(),
                });
            }
            let data = encode(event)?;
            table.insert(event.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        debug!(event_id = %event.id, "Recorded event in ledger");
        Ok(())
    }

    fn mark_succeeded(&self, id: &EventId) -> Result<(), SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(EVENTS_TABLE)?;
            let mut event = match table.get(id.as_str())? {
                Some(v) => decode(v.value())?,
                None => return Err(SyncError::NotFound(format!("event {id}"))),
            };
            if event.succeeded {
                return Ok(());
            }
            event.succeeded = true;
            let data = encode(&event)?;
            table.insert(id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn unsuccessful_events(&self) -> Result<Vec<UpdateEvent>, SyncError> {
        Ok(self
            .all_events()?
            .into_iter()
            .filter(|e| !e.succeeded)
            .collect())
    }

    fn get(&self, id: &EventId) -> Result<Option<UpdateEvent>, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        match table.get(id.as_str())? {
            Some(v) => Ok(Some(decode(v.value())?)),
            None => Ok(None),
        }
    }

    fn all_events(&self) -> Result<Vec<UpdateEvent>, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(EVENTS_TABLE)?;

        let mut events = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            events.push(decode(value.value())?);
        }
        events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(events)
    }
}
