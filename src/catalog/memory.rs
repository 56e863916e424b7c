//! In-memory catalog backend.
//!
//! Thread-safe, intended for embedded use, tests, and as the working set of
//! the snapshot backend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::catalog::entry::CatalogEntry;
use crate::catalog::traits::{Catalog, EntryUpdate, StorageError};
use crate::identity::CatalogKey;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::LockPoisoned(context.to_string())
}

type Slot = Arc<Mutex<Option<CatalogEntry>>>;

/// Catalog held in process memory.
///
/// The key map is guarded by an `RwLock`; each key has its own `Mutex`
/// slot, so an upsert only blocks other upserts of the same key.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    slots: RwLock<BTreeMap<CatalogKey, Slot>>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-filled with `entries`.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let slots = entries
            .into_iter()
            .map(|e| (e.key.clone(), Arc::new(Mutex::new(Some(e)))))
            .collect();
        Self {
            slots: RwLock::new(slots),
        }
    }

    fn slot(&self, key: &CatalogKey) -> Result<Slot, StorageError> {
        {
            let slots = self.slots.read().map_err(|_| lock_err("catalog keys"))?;
            if let Some(slot) = slots.get(key) {
                return Ok(Arc::clone(slot));
            }
        }
        let mut slots = self.slots.write().map_err(|_| lock_err("catalog keys"))?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    /// Drops `key`'s slot if it is empty and no other upsert holds it.
    fn discard_vacant(&self, key: &CatalogKey) -> Result<(), StorageError> {
        let mut slots = self.slots.write().map_err(|_| lock_err("catalog keys"))?;
        let Some(slot) = slots.get(key) else {
            return Ok(());
        };
        // With the map write-locked, no new handle can be taken.
        if Arc::strong_count(slot) > 1 {
            return Ok(());
        }
        if slot.lock().map_err(|_| lock_err("catalog entry"))?.is_none() {
            slots.remove(key);
        }
        Ok(())
    }

    fn snapshot_slots(&self) -> Result<Vec<Slot>, StorageError> {
        let slots = self.slots.read().map_err(|_| lock_err("catalog keys"))?;
        Ok(slots.values().cloned().collect())
    }
}

impl Catalog for InMemoryCatalog {
    fn get(&self, key: &CatalogKey) -> Result<Option<CatalogEntry>, StorageError> {
        let slot = {
            let slots = self.slots.read().map_err(|_| lock_err("catalog keys"))?;
            match slots.get(key) {
                Some(slot) => Arc::clone(slot),
                None => return Ok(None),
            }
        };
        let guard = slot.lock().map_err(|_| lock_err("catalog entry"))?;
        Ok(guard.clone())
    }

    fn upsert_with(&self, key: &CatalogKey, update: &mut EntryUpdate<'_>) -> Result<bool, StorageError> {
        let slot = self.slot(key)?;
        let mut guard = slot.lock().map_err(|_| lock_err("catalog entry"))?;
        if let Some(next) = update(guard.as_ref()) {
            *guard = Some(next);
            return Ok(true);
        }
        let vacant = guard.is_none();
        drop(guard);
        drop(slot);
        if vacant {
            self.discard_vacant(key)?;
        }
        Ok(false)
    }

    fn len(&self) -> Result<usize, StorageError> {
        let mut occupied = 0;
        for slot in self.snapshot_slots()? {
            if slot.lock().map_err(|_| lock_err("catalog entry"))?.is_some() {
                occupied += 1;
            }
        }
        Ok(occupied)
    }

    fn keys(&self) -> Result<Vec<CatalogKey>, StorageError> {
        Ok(self.entries()?.into_iter().map(|e| e.key).collect())
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        let mut out = Vec::new();
        for slot in self.snapshot_slots()? {
            let guard = slot.lock().map_err(|_| lock_err("catalog entry"))?;
            if let Some(entry) = guard.as_ref() {
                out.push(entry.clone());
            }
        }
        Ok(out)
    }
}
