//! Source adapters.
//!
//! One adapter per source turns a [`PageModel`] into [`RawRecord`]s in that
//! source's own vocabulary. Adapters are pure: no I/O, no shared state.
//! Each one declares the raw labels it emits in a static [`FieldMapping`]
//! table, which the normalizer's registry is built from.
//!
//! Rows that are not component entries (separators, footnotes, repeated
//! headers) are skipped and counted. Records without a vendor or a model are
//! dropped and counted. Only a page whose shape is not recognizable at all,
//! or whose share of skipped rows exceeds the adapter's tolerance, fails, and
//! only for its own source.

pub mod cpu_dataset;
pub mod cpu_listing;
pub mod gpu_encyclopedia;

use crate::component::ComponentKind;
use crate::error::SourceStructureError;
use crate::normalize::FieldMapping;
use crate::page::PageModel;
use crate::record::RawRecord;
use crate::source::SourceId;

pub use cpu_dataset::CpuDatasetAdapter;
pub use cpu_listing::CpuListingAdapter;
pub use gpu_encyclopedia::GpuEncyclopediaAdapter;

/// What an adapter extracted from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptOutcome {
    /// Records with a vendor and a model, in row order.
    pub records: Vec<RawRecord>,
    /// Rows that were not component entries.
    pub rows_skipped: usize,
    /// Component rows lacking a vendor or a model.
    pub records_dropped: usize,
}

/// Converts pages of one source into raw records.
pub trait SourceAdapter: Send + Sync {
    /// The source this adapter reads.
    fn source_id(&self) -> SourceId;

    /// The component kind every record of this source describes.
    fn kind(&self) -> ComponentKind;

    /// Every raw label this adapter may emit.
    fn field_map(&self) -> &'static [FieldMapping];

    /// Extracts raw records from a page.
    ///
    /// # Errors
    ///
    /// Returns [`SourceStructureError`] when the page shape is not
    /// recognizable for this source.
    fn adapt(&self, page: &PageModel) -> Result<AdaptOutcome, SourceStructureError>;
}

/// Intel listings prefix code names with "Products formerly".
pub(crate) fn strip_codename_prefix(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    for prefix in ["products formerly ", "formerly "] {
        if lower.starts_with(prefix) {
            return trimmed[prefix.len()..].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Running row counts for one page, turned into an outcome or a structure
/// error once every row has been seen.
#[derive(Debug)]
pub(crate) struct RowTally {
    source_id: SourceId,
    tolerance: f64,
    total: usize,
    outcome: AdaptOutcome,
}

impl RowTally {
    pub(crate) fn start(page: &PageModel, tolerance: f64) -> Result<Self, SourceStructureError> {
        if page.rows.is_empty() {
            return Err(SourceStructureError::EmptyPage {
                source_id: page.source_id.clone(),
            });
        }
        Ok(Self {
            source_id: page.source_id.clone(),
            tolerance,
            total: page.rows.len(),
            outcome: AdaptOutcome::default(),
        })
    }

    pub(crate) fn skip(&mut self, row: usize, why: &'static str) {
        tracing::debug!(source = %self.source_id, row, reason = why, "skipping row");
        self.outcome.rows_skipped += 1;
    }

    /// Keeps `record` if it carries a non-blank vendor and model.
    pub(crate) fn emit(&mut self, record: RawRecord, vendor_label: &str, model_label: &str) {
        if record.has(vendor_label) && record.has(model_label) {
            self.outcome.records.push(record);
        } else {
            tracing::debug!(source = %self.source_id, "dropping record without vendor or model");
            self.outcome.records_dropped += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn finish(self) -> Result<AdaptOutcome, SourceStructureError> {
        let recognized = self.outcome.records.len() + self.outcome.records_dropped;
        if recognized == 0 {
            return Err(SourceStructureError::NoRecognizedRows {
                source_id: self.source_id,
                rows: self.total,
            });
        }
        let ratio = self.outcome.rows_skipped as f64 / self.total as f64;
        if ratio > self.tolerance {
            return Err(SourceStructureError::TooManyUnrecognizedRows {
                source_id: self.source_id,
                skipped: self.outcome.rows_skipped,
                total: self.total,
                tolerance: self.tolerance,
            });
        }
        Ok(self.outcome)
    }
}
