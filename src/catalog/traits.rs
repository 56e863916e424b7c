//! Abstract catalog trait.
//!
//! The catalog is an external collaborator: the pipeline only needs
//! upsert-by-key with a per-key critical section. Backends decide how
//! entries are stored.

use thiserror::Error;

use crate::catalog::entry::CatalogEntry;
use crate::identity::CatalogKey;

/// Errors raised by catalog backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A lock was poisoned by a panicking writer.
    #[error("Poisoned lock: {0}")]
    LockPoisoned(String),

    /// Backing file I/O failed.
    #[error("Catalog I/O error: {0}")]
    Io(String),

    /// An entry could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data failed an integrity check.
    #[error("Corrupt catalog data: {0}")]
    Corrupt(String),

    /// Another process holds the catalog.
    #[error("Catalog is locked: {0}")]
    Locked(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock => Self::Locked(err.to_string()),
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                Self::Corrupt(err.to_string())
            }
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Closure run under the per-key lock. Receives the current entry (if any)
/// and returns the replacement, or `None` to leave the entry as is.
pub type EntryUpdate<'a> = dyn FnMut(Option<&CatalogEntry>) -> Option<CatalogEntry> + 'a;

/// Storage for catalog entries.
///
/// # Concurrency
/// - `upsert_with` must run `update` and store its result atomically with
///   respect to other `upsert_with` calls on the same key.
/// - Calls on different keys may proceed in parallel.
/// - Entries are never deleted.
pub trait Catalog: Send + Sync {
    /// Get the entry for a key.
    fn get(&self, key: &CatalogKey) -> Result<Option<CatalogEntry>, StorageError>;

    /// Read-modify-write of one entry under its per-key lock.
    ///
    /// Returns `true` when `update` produced a replacement.
    fn upsert_with(&self, key: &CatalogKey, update: &mut EntryUpdate<'_>) -> Result<bool, StorageError>;

    /// All keys, in key order.
    fn keys(&self) -> Result<Vec<CatalogKey>, StorageError>;

    /// All entries, in key order.
    fn entries(&self) -> Result<Vec<CatalogEntry>, StorageError>;

    /// Number of entries.
    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.keys()?.len())
    }

    /// True when the catalog holds no entries.
    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}
