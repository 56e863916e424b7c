//! CPU vendor product listing.
//!
//! Each row is one product page, with cells labelled by the listing's
//! `data-key` attributes (`ProcessorNumber`, `CoreCount`, `ClockSpeed`, ...).
//! Products that are not processors and products without a processor number
//! never become records.

use crate::adapter::{strip_codename_prefix, AdaptOutcome, RowTally, SourceAdapter};
use crate::component::ComponentKind;
use crate::error::SourceStructureError;
use crate::normalize::{FieldMapping, Unit};
use crate::page::PageModel;
use crate::record::RawRecord;
use crate::schema::CanonicalField;
use crate::source::SourceId;

const VENDOR: &str = "Vendor";
const MODEL: &str = "ProcessorNumber";
const CODENAME: &str = "CodeNameText";
const PRODUCT_TYPE: &str = "ProductType";

/// Listing vendor when the page does not name one.
pub const DEFAULT_VENDOR: &str = "Intel";

/// Data-keys read by [`CpuListingAdapter`].
pub const FIELD_MAP: &[FieldMapping] = &[
    FieldMapping::new(VENDOR, CanonicalField::Vendor),
    FieldMapping::new(MODEL, CanonicalField::Model),
    FieldMapping::new("ProductId", CanonicalField::ProductId),
    FieldMapping::new(CODENAME, CanonicalField::Codename),
    FieldMapping::new("BornOnDate", CanonicalField::Launch),
    FieldMapping::new("CoreCount", CanonicalField::CoreCount),
    FieldMapping::new("ThreadCount", CanonicalField::ThreadCount),
    FieldMapping::new("ClockSpeed", CanonicalField::BaseClockMhz),
    FieldMapping::new("ClockSpeedMax", CanonicalField::BoostClockMhz).max(),
    FieldMapping::new("Cache", CanonicalField::CacheKb).unit(Unit::Mib),
    FieldMapping::new("MaxTDP", CanonicalField::TdpW).unit(Unit::Watt),
    FieldMapping::new("Lithography", CanonicalField::ProcessNm).unit(Unit::Nanometer),
    FieldMapping::new("SocketsSupported", CanonicalField::Socket),
    FieldMapping::new("VerticalSegment", CanonicalField::Segment),
];

/// The data-key as spelled in [`FIELD_MAP`].
fn known_key(label: &str) -> Option<&'static str> {
    let label = label.trim();
    FIELD_MAP
        .iter()
        .map(|m| m.label)
        .find(|key| key.eq_ignore_ascii_case(label))
}

fn is_known_key(label: &str) -> bool {
    label.trim().eq_ignore_ascii_case(PRODUCT_TYPE) || known_key(label).is_some()
}

/// Adapter for the vendor's own processor listing.
#[derive(Debug, Clone)]
pub struct CpuListingAdapter {
    tolerance: f64,
}

impl Default for CpuListingAdapter {
    fn default() -> Self {
        Self { tolerance: 0.5 }
    }
}

impl CpuListingAdapter {
    /// Sets the maximum share of skipped rows before the page is rejected.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl SourceAdapter for CpuListingAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::cpu_vendor_listing()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Cpu
    }

    fn field_map(&self) -> &'static [FieldMapping] {
        FIELD_MAP
    }

    fn adapt(&self, page: &PageModel) -> Result<AdaptOutcome, SourceStructureError> {
        let mut tally = RowTally::start(page, self.tolerance)?;

        if !page.rows.iter().any(|row| row.get(MODEL).is_some()) {
            return Err(SourceStructureError::MissingColumn {
                source_id: page.source_id.clone(),
                column: MODEL.to_string(),
            });
        }

        let vendor = page.context_value("vendor").unwrap_or(DEFAULT_VENDOR);

        for (idx, row) in page.rows.iter().enumerate() {
            if row.is_blank() {
                tally.skip(idx, "blank");
                continue;
            }
            if !row.cells().iter().any(|c| !c.is_blank() && is_known_key(&c.label)) {
                tally.skip(idx, "no known data-key");
                continue;
            }
            if let Some(kind) = row.get(PRODUCT_TYPE) {
                if !kind.to_ascii_lowercase().contains("processor") {
                    tally.skip(idx, "not a processor");
                    continue;
                }
            }

            let mut record = RawRecord::new(page.source_id.clone(), page.fetched_at, ComponentKind::Cpu);
            record.insert(VENDOR, vendor);
            for cell in row.cells() {
                match known_key(&cell.label) {
                    Some(CODENAME) => record.insert(CODENAME, strip_codename_prefix(&cell.value)),
                    Some(key) => record.insert(key, cell.value.clone()),
                    None if cell.label.trim().eq_ignore_ascii_case(PRODUCT_TYPE) => {}
                    None => record.insert(cell.label.trim(), cell.value.clone()),
                }
            }
            tally.emit(record, VENDOR, MODEL);
        }

        tally.finish()
    }
}
