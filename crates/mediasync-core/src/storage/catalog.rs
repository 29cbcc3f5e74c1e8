//! Local catalog tables
//!
//! One table per media kind, keyed by content id, holding JSON records.

use redb::{ReadableTable, TableDefinition};

use super::{MetadataStore, Storage};
use crate::error::SyncError;
use crate::types::{ContentId, ContentRecord, MediaKind};

pub(crate) const SOUNDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("sounds");
pub(crate) const SONGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("songs");
pub(crate) const AUTHORS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("authors");

fn table_for(kind: MediaKind) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match kind {
        MediaKind::Sound => SOUNDS_TABLE,
        MediaKind::Song => SONGS_TABLE,
        MediaKind::Author => AUTHORS_TABLE,
    }
}

impl Storage {
    fn write_record(&self, record: &ContentRecord, must_exist: bool) -> Result<(), SyncError> {
        let data = record.to_json()?;
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(table_for(record.kind()))?;
            let key = record.id().as_str();
            if must_exist && table.get(key)?.is_none() {
                return Err(SyncError::NotFound(format!(
                    "{} {}",
                    record.kind(),
                    record.id()
                )));
            }
            table.insert(key, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl MetadataStore for Storage {
    /// Insert a record. An existing row with the same id is overwritten.
    fn insert_entity(&self, record: &ContentRecord) -> Result<(), SyncError> {
        self.write_record(record, false)
    }

    fn update_entity(&self, record: &ContentRecord) -> Result<(), SyncError> {
        self.write_record(record, true)
    }

    fn delete_entity(&self, kind: MediaKind, id: &ContentId) -> Result<bool, SyncError> {
        let db = self.db.read();
        let write_txn = db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(table_for(kind))?;
            let removed = table.remove(id.as_str())?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn entity_exists(&self, kind: MediaKind, id: &ContentId) -> Result<bool, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;

        Ok(table.get(id.as_str())?.is_some())
    }

    fn get_entity(
        &self,
        kind: MediaKind,
        id: &ContentId,
    ) -> Result<Option<ContentRecord>, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;

        match table.get(id.as_str())? {
            Some(v) => Ok(Some(ContentRecord::from_json(kind, v.value())?)),
            None => Ok(None),
        }
    }

    fn list_entities(&self, kind: MediaKind) -> Result<Vec<ContentRecord>, SyncError> {
        let db = self.db.read();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(table_for(kind))?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            records.push(ContentRecord::from_json(kind, value.value())?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::create_test_storage;
    use crate::types::{Author, Sound};

    fn sound(id: &str, title: &str) -> ContentRecord {
        ContentRecord::Sound(Sound {
            id: ContentId::new(id),
            title: title.to_string(),
            author_id: "a1".to_string(),
            description: String::new(),
            date_added: None,
            duration: 3.5,
            is_offensive: false,
        })
    }

    #[test]
    fn test_insert_get_and_exists() {
        let (storage, _temp) = create_test_storage();
        let record = sound("123", "Clip");
        let id = ContentId::new("123");

        assert!(!storage.entity_exists(MediaKind::Sound, &id).unwrap());
        storage.insert_entity(&record).unwrap();
        assert!(storage.entity_exists(MediaKind::Sound, &id).unwrap());
        // Same id under a different kind is a different row
        assert!(!storage.entity_exists(MediaKind::Song, &id).unwrap());

        let loaded = storage.get_entity(MediaKind::Sound, &id).unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[test]
    fn test_update_requires_existing_row() {
        let (storage, _temp) = create_test_storage();
        let err = storage.update_entity(&sound("123", "Clip")).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));

        storage.insert_entity(&sound("123", "Clip")).unwrap();
        storage.update_entity(&sound("123", "Renamed")).unwrap();
        let loaded = storage
            .get_entity(MediaKind::Sound, &ContentId::new("123"))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.title(), "Renamed");
    }

    #[test]
    fn test_delete_reports_whether_removed() {
        let (storage, _temp) = create_test_storage();
        let id = ContentId::new("a1");
        storage
            .insert_entity(&ContentRecord::Author(Author {
                id: id.clone(),
                name: "Someone".to_string(),
                photo: None,
                description: None,
            }))
            .unwrap();

        assert!(storage.delete_entity(MediaKind::Author, &id).unwrap());
        assert!(!storage.delete_entity(MediaKind::Author, &id).unwrap());
        assert!(storage.list_entities(MediaKind::Author).unwrap().is_empty());
    }

    #[test]
    fn test_list_entities() {
        let (storage, _temp) = create_test_storage();
        storage.insert_entity(&sound("1", "One")).unwrap();
        storage.insert_entity(&sound("2", "Two")).unwrap();

        assert_eq!(storage.list_entities(MediaKind::Sound).unwrap().len(), 2);
        assert!(storage.list_entities(MediaKind::Song).unwrap().is_empty());
    }
}
