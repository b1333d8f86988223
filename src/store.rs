//! Entity storage
//!
//! Uses the sled embedded database. Records are stored as JSON documents keyed
//! by `KIND:registration-number`; a secondary `links` tree keeps the tax
//! identifiers the link-list writer needs, so it never has to decode records.

use crate::types::{EntityKind, EntityRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Database directory name inside the data dir
pub const STORE_DIR: &str = "entities.sled";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

/// Tax identifiers of one stored entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkKey {
    pub inn: Option<String>,
    pub kpp: Option<String>,
}

impl LinkKey {
    pub fn of(record: &EntityRecord) -> Self {
        Self {
            inn: record.tax_id.clone(),
            kpp: record.kpp.clone(),
        }
    }
}

/// Persistent entity store.
///
/// Cloning is cheap and every clone writes to the same database, so each
/// worker can hold its own handle.
#[derive(Clone)]
pub struct EntityStore {
    db: sled::Db,
    entities: sled::Tree,
    links: sled::Tree,
}

impl EntityStore {
    /// Open or create the store under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = data_dir.as_ref().join(STORE_DIR);
        let db = sled::open(&db_path)?;
        let entities = db.open_tree("entities")?;
        let links = db.open_tree("links")?;
        Ok(Self {
            db,
            entities,
            links,
        })
    }

    /// Insert or replace a batch of records. Each tree gets one atomic batch.
    pub fn write_batch(&self, records: &[EntityRecord]) -> Result<usize, StoreError> {
        let mut entity_batch = sled::Batch::default();
        let mut link_batch = sled::Batch::default();

        for record in records {
            let key = record.key();
            entity_batch.insert(key.as_bytes(), serde_json::to_vec(record)?);
            link_batch.insert(key.as_bytes(), bincode::serialize(&LinkKey::of(record))?);
        }

        self.entities.apply_batch(entity_batch)?;
        self.links.apply_batch(link_batch)?;
        Ok(records.len())
    }

    pub fn get(&self, kind: EntityKind, registration_number: &str) -> Option<EntityRecord> {
        let key = format!("{}:{}", kind, registration_number);
        match self.entities.get(key.as_bytes()) {
            Ok(Some(data)) => match serde_json::from_slice(&data) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Failed to decode record {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read record {}: {}", key, e);
                None
            }
        }
    }

    /// Iterate over all records lazily; undecodable entries are skipped
    pub fn iter_records(&self) -> impl Iterator<Item = EntityRecord> + '_ {
        self.entities
            .iter()
            .values()
            .filter_map(|r| r.ok())
            .filter_map(|v| serde_json::from_slice(&v).ok())
    }

    /// Read cursor over the tax identifiers of every stored entity
    pub fn link_keys(&self) -> impl Iterator<Item = Result<LinkKey, StoreError>> + '_ {
        self.links.iter().values().map(|r| -> Result<LinkKey, StoreError> {
            let data = r?;
            Ok(bincode::deserialize::<LinkKey>(&data)?)
        })
    }

    pub fn count_by_kind(&self, kind: EntityKind) -> usize {
        let prefix = format!("{}:", kind);
        self.entities.scan_prefix(prefix.as_bytes()).keys().count()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Remove every stored entity
    pub fn clear(&self) -> Result<(), StoreError> {
        let dropped = self.entities.len();
        self.entities.clear()?;
        self.links.clear()?;
        self.db.flush()?;
        info!("Cleared entity store ({} records dropped)", dropped);
        Ok(())
    }

    /// Flush sled buffers to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisplayName, Status};
    use tempfile::TempDir;

    fn record(kind: EntityKind, ogrn: &str, inn: Option<&str>) -> EntityRecord {
        EntityRecord {
            kind,
            value: format!("Entity {}", ogrn),
            tax_id: inn.map(str::to_string),
            tax_reg_code: None,
            primary_registration_number: ogrn.to_string(),
            registration_date: 1_433_116_800_000,
            status: Status::Active,
            display_name: DisplayName::default(),
            main_classification_codes: Vec::new(),
            manager_name: None,
            manager_title: None,
            emails: Vec::new(),
            authorities: Default::default(),
            kpp: inn.map(|_| "770101001".to_string()),
            address: None,
            founders: None,
            capital: None,
            registration_documents: None,
            person_name: None,
            legal_form: None,
            citizenship: None,
        }
    }

    #[test]
    fn test_write_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = EntityStore::open(temp_dir.path()).unwrap();

        store
            .write_batch(&[
                record(EntityKind::Legal, "1027700123456", Some("7701234567")),
                record(EntityKind::Individual, "304770000000011", None),
            ])
            .unwrap();

        assert_eq!(store.len(), 2);
        let found = store.get(EntityKind::Legal, "1027700123456").unwrap();
        assert_eq!(found.tax_id.as_deref(), Some("7701234567"));
        assert!(store.get(EntityKind::Individual, "1027700123456").is_none());
        assert_eq!(store.count_by_kind(EntityKind::Legal), 1);
        assert_eq!(store.count_by_kind(EntityKind::Individual), 1);
    }

    #[test]
    fn test_rewrite_replaces_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = EntityStore::open(temp_dir.path()).unwrap();

        store
            .write_batch(&[record(EntityKind::Legal, "1", Some("7701"))])
            .unwrap();
        let mut updated = record(EntityKind::Legal, "1", Some("7702"));
        updated.status = Status::Liquidated;
        store.write_batch(&[updated]).unwrap();

        assert_eq!(store.len(), 1);
        let found = store.get(EntityKind::Legal, "1").unwrap();
        assert_eq!(found.status, Status::Liquidated);
        let keys: Vec<_> = store.link_keys().collect::<Result<_, _>>().unwrap();
        assert_eq!(keys[0].inn.as_deref(), Some("7702"));
    }

    #[test]
    fn test_clones_share_database_and_persist() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = EntityStore::open(temp_dir.path()).unwrap();
            let handle = store.clone();
            let writer = std::thread::spawn(move || {
                handle
                    .write_batch(&[record(EntityKind::Legal, "2", None)])
                    .unwrap();
            });
            store
                .write_batch(&[record(EntityKind::Legal, "1", None)])
                .unwrap();
            writer.join().unwrap();
            store.flush().unwrap();
        }

        let store = EntityStore::open(temp_dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.iter_records().count(), 2);
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = EntityStore::open(temp_dir.path()).unwrap();
        store
            .write_batch(&[record(EntityKind::Legal, "1", Some("7701"))])
            .unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.link_keys().count(), 0);
    }
}
