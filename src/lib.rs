//! # hwcatalog - GPU and CPU hardware catalogs from messy sources
//!
//! hwcatalog turns row-structured pages scraped from heterogeneous sources
//! (an encyclopedia's GPU tables, a vendor's processor listing, a community
//! CPU dataset) into one deduplicated, versioned catalog entry per part.
//!
//! ## Pipeline
//!
//! - **Adapter**: [`PageModel`] → [`RawRecord`]s in the source's own labels
//! - **Normalizer**: [`RawRecord`] → [`CanonicalRecord`] in canonical units
//! - **Identity**: [`CanonicalRecord`] → [`CatalogKey`]
//! - **Merge**: folds the record into the [`CatalogEntry`] for its key, with
//!   per-field provenance and deterministic conflict resolution
//!
//! Re-running the pipeline on the same pages is a no-op: merges are
//! idempotent.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use hwcatalog::{
//!     CanonicalField, Catalog, InMemoryCatalog, PageModel, Pipeline, PipelineConfig, RunOptions, SourceId,
//! };
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! let pipeline = Pipeline::new(&PipelineConfig::default(), catalog.clone())?;
//!
//! let page = PageModel::new(SourceId::cpu_dataset(), Utc::now()).with_pairs([
//!     ("Processor Number", "i9-9900K"),
//!     ("# of Cores", "8"),
//!     ("Processor Base Frequency", "3.60 GHz"),
//! ]);
//! let report = pipeline.run([page], &RunOptions::default())?;
//! assert_eq!(report.exit_code(), 0);
//!
//! let entry = catalog.get(&"intel/cpu/i-9-9900-k".parse()?)?.expect("merged");
//! assert_eq!(entry.integer(CanonicalField::BaseClockMhz), Some(3600));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod component;
pub mod error;
pub mod page;
pub mod record;
pub mod schema;
pub mod source;
pub mod value;

// Pipeline stages
pub mod adapter;
pub mod identity;
pub mod merge;
pub mod normalize;

// Storage, orchestration and configuration
pub mod catalog;
pub mod config;
pub mod pipeline;

// Derived views
pub mod lookup;
pub mod score;

// Re-export primary types at crate root for convenience
pub use adapter::{AdaptOutcome, CpuDatasetAdapter, CpuListingAdapter, GpuEncyclopediaAdapter, SourceAdapter};
pub use catalog::{Catalog, CatalogEntry, EntryField, FieldProvenance, InMemoryCatalog, StorageError};
pub use component::ComponentKind;
pub use config::PipelineConfig;
pub use error::{CatalogError, CatalogResult, ConfigError, RuntimeError, SourceStructureError};
pub use identity::{AliasTable, CatalogKey, IdentityResolver, UnresolvedIdentityWarning};
pub use merge::{ConflictResolved, MergeEngine, MergeOutcome, MergePolicy, TieBreak};
pub use normalize::{FieldNormalizer, FieldParseWarning};
pub use page::{Cell, PageModel, PageRow};
pub use pipeline::{CancellationToken, Pipeline, RunOptions, RunReport, SourceReport};
pub use record::{CanonicalRecord, RawRecord};
pub use schema::CanonicalField;
pub use source::{ConfidenceTier, SourceId};
pub use value::{FieldValue, MarketSegment, SocketType};

#[cfg(feature = "persistent")]
pub use catalog::SnapshotCatalog;
