//! Snapshot-backed catalog.
//!
//! Entries live in an [`InMemoryCatalog`]; [`SnapshotCatalog::flush`] writes
//! them to `catalog.snapshot` in the catalog directory. Writes go to a
//! temporary file that is synced and renamed over the previous snapshot, so
//! a crash leaves either the old or the new snapshot, never a torn one. The
//! directory is locked for the lifetime of the catalog.
//!
//! ```text
//! <dir>/
//!   catalog.lock        exclusive lock (flock / LockFileEx)
//!   catalog.snapshot    header + one checksummed JSON frame
//! ```

pub mod codec;
pub mod file_lock;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::catalog::entry::CatalogEntry;
use crate::catalog::memory::InMemoryCatalog;
use crate::catalog::traits::{Catalog, EntryUpdate, StorageError};
use crate::identity::CatalogKey;

pub use file_lock::FileLock;

/// Name of the snapshot file inside the catalog directory.
pub const SNAPSHOT_FILE: &str = "catalog.snapshot";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    entries: Vec<CatalogEntry>,
}

/// A catalog persisted as a checksummed snapshot file.
#[derive(Debug)]
pub struct SnapshotCatalog {
    dir: PathBuf,
    inner: InMemoryCatalog,
    dirty: AtomicBool,
    _lock: FileLock,
}

impl SnapshotCatalog {
    /// Opens (or creates) the catalog in `dir`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Locked`] if another process holds the directory
    /// - [`StorageError::Corrupt`] if the snapshot fails validation
    /// - [`StorageError::Io`] on other I/O failures
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let lock = FileLock::acquire(&dir)?;

        let path = dir.join(SNAPSHOT_FILE);
        let entries = match File::open(&path) {
            Ok(file) => {
                let mut reader = BufReader::new(file);
                codec::read_header(&mut reader)?;
                let snapshot: Snapshot = codec::decode(&mut reader)?;
                snapshot.entries
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened catalog snapshot");

        Ok(Self {
            dir,
            inner: InMemoryCatalog::from_entries(entries),
            dirty: AtomicBool::new(false),
            _lock: lock,
        })
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Writes the snapshot if anything changed since the last flush.
    ///
    /// # Errors
    ///
    /// Returns the I/O or serialization failure; the catalog stays dirty.
    pub fn flush(&self) -> Result<(), StorageError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.write_snapshot();
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    fn write_snapshot(&self) -> Result<(), StorageError> {
        let snapshot = Snapshot {
            entries: self.inner.entries()?,
        };
        let frame = codec::encode(&snapshot).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let target = self.snapshot_path();
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            codec::write_header(&mut writer)?;
            writer.write_all(&frame)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        sync_dir(&self.dir)?;
        tracing::debug!(
            path = %target.display(),
            entries = snapshot.entries.len(),
            bytes = frame.len(),
            "wrote catalog snapshot"
        );
        Ok(())
    }
}

/// Makes a rename inside `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Directory handles cannot be synced here; the rename is durable once the
/// file system commits its metadata.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

impl Catalog for SnapshotCatalog {
    fn get(&self, key: &CatalogKey) -> Result<Option<CatalogEntry>, StorageError> {
        self.inner.get(key)
    }

    fn upsert_with(&self, key: &CatalogKey, update: &mut EntryUpdate<'_>) -> Result<bool, StorageError> {
        let changed = self.inner.upsert_with(key, update)?;
        if changed {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(changed)
    }

    fn keys(&self) -> Result<Vec<CatalogKey>, StorageError> {
        self.inner.keys()
    }

    fn len(&self) -> Result<usize, StorageError> {
        self.inner.len()
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>, StorageError> {
        self.inner.entries()
    }
}

impl Drop for SnapshotCatalog {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!(error = %err, dir = %self.dir.display(), "failed to flush catalog snapshot on drop");
        }
    }
}
