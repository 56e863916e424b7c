//! The catalog: one merged entry per physical part.
//!
//! The pipeline talks to the catalog through the [`Catalog`] trait, passed
//! in explicitly. [`InMemoryCatalog`] is the reference backend;
//! `SnapshotCatalog` (feature `persistent`) adds a checksummed snapshot
//! file.

pub mod entry;
pub mod memory;
#[cfg(feature = "persistent")]
pub mod persistent;
pub mod traits;

pub use entry::{CatalogEntry, EntryField, FieldProvenance, SupersedeReason, SupersededValue};
pub use memory::InMemoryCatalog;
#[cfg(feature = "persistent")]
pub use persistent::SnapshotCatalog;
pub use traits::{Catalog, EntryUpdate, StorageError};
