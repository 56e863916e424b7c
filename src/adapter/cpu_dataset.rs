//! Community CPU dataset.
//!
//! A JSON dump keyed by product id, flattened upstream into one row per
//! product with section-qualified labels such as `Essentials/Processor
//! Number` or `Performance/# of Cores`. Only the last label segment is
//! meaningful here.

use crate::adapter::{strip_codename_prefix, AdaptOutcome, RowTally, SourceAdapter};
use crate::component::ComponentKind;
use crate::error::SourceStructureError;
use crate::normalize::{FieldMapping, Unit};
use crate::page::PageModel;
use crate::record::RawRecord;
use crate::schema::CanonicalField;
use crate::source::SourceId;

const VENDOR: &str = "Vendor";
const MODEL: &str = "Processor Number";
const CODENAME: &str = "Code Name";

/// Dataset vendor when the page does not name one.
pub const DEFAULT_VENDOR: &str = "Intel";

/// Labels read by [`CpuDatasetAdapter`], after the section prefix is
/// removed.
pub const FIELD_MAP: &[FieldMapping] = &[
    FieldMapping::new(VENDOR, CanonicalField::Vendor),
    FieldMapping::new(MODEL, CanonicalField::Model),
    FieldMapping::new("id", CanonicalField::ProductId),
    FieldMapping::new(CODENAME, CanonicalField::Codename),
    FieldMapping::new("Launch Date", CanonicalField::Launch),
    FieldMapping::new("Vertical Segment", CanonicalField::Segment),
    FieldMapping::new("Lithography", CanonicalField::ProcessNm).unit(Unit::Nanometer),
    FieldMapping::new("# of Cores", CanonicalField::CoreCount),
    FieldMapping::new("# of Threads", CanonicalField::ThreadCount),
    FieldMapping::new("Processor Base Frequency", CanonicalField::BaseClockMhz),
    FieldMapping::new("Max Turbo Frequency", CanonicalField::BoostClockMhz).max(),
    FieldMapping::new("Cache", CanonicalField::CacheKb).unit(Unit::Mib),
    FieldMapping::new("TDP", CanonicalField::TdpW).unit(Unit::Watt),
    FieldMapping::new("Sockets Supported", CanonicalField::Socket),
];

/// `Essentials/Processor Number` → `Processor Number`.
fn leaf_label(label: &str) -> &str {
    label.rsplit_once('/').map_or(label, |(_, leaf)| leaf).trim()
}

fn known_label(label: &str) -> Option<&'static str> {
    let leaf = leaf_label(label);
    FIELD_MAP
        .iter()
        .map(|m| m.label)
        .find(|known| known.eq_ignore_ascii_case(leaf))
}

/// Adapter for the community-maintained CPU dataset.
#[derive(Debug, Clone)]
pub struct CpuDatasetAdapter {
    tolerance: f64,
}

impl Default for CpuDatasetAdapter {
    fn default() -> Self {
        Self { tolerance: 0.5 }
    }
}

impl CpuDatasetAdapter {
    /// Sets the maximum share of skipped rows before the page is rejected.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

impl SourceAdapter for CpuDatasetAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::cpu_dataset()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Cpu
    }

    fn field_map(&self) -> &'static [FieldMapping] {
        FIELD_MAP
    }

    fn adapt(&self, page: &PageModel) -> Result<AdaptOutcome, SourceStructureError> {
        let mut tally = RowTally::start(page, self.tolerance)?;

        let has_model = page
            .rows
            .iter()
            .flat_map(|row| row.cells())
            .any(|c| known_label(&c.label) == Some(MODEL));
        if !has_model {
            return Err(SourceStructureError::MissingColumn {
                source_id: page.source_id.clone(),
                column: MODEL.to_string(),
            });
        }

        let vendor = page.context_value("vendor").unwrap_or(DEFAULT_VENDOR);

        for (idx, row) in page.rows.iter().enumerate() {
            if !row.cells().iter().any(|c| !c.is_blank() && known_label(&c.label).is_some()) {
                tally.skip(idx, "no known label");
                continue;
            }

            let mut record = RawRecord::new(page.source_id.clone(), page.fetched_at, ComponentKind::Cpu);
            record.insert(VENDOR, vendor);
            for cell in row.cells() {
                match known_label(&cell.label) {
                    Some(CODENAME) => record.insert(CODENAME, strip_codename_prefix(&cell.value)),
                    Some(label) => record.insert(label, cell.value.clone()),
                    None => record.insert(leaf_label(&cell.label), cell.value.clone()),
                }
            }
            tally.emit(record, VENDOR, MODEL);
        }

        tally.finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn i5_750() -> [(&'static str, &'static str); 7] {
        [
            ("id", "42915"),
            ("name", "Intel Core i5-750 Processor (8M Cache, 2.66 GHz)"),
            ("Essentials/Processor Number", "i5-750"),
            ("Essentials/Code Name", "Products formerly Lynnfield"),
            ("Performance/# of Cores", "4"),
            ("Performance/Processor Base Frequency", "2.66 GHz"),
            ("Performance/TDP", "95 W"),
        ]
    }

    #[test]
    fn section_prefixes_are_removed() {
        assert_eq!(leaf_label("Performance/# of Cores"), "# of Cores");
        assert_eq!(leaf_label("id"), "id");
        assert_eq!(known_label("essentials/processor number"), Some(MODEL));
    }

    #[test]
    fn dataset_rows_become_records() {
        let page = PageModel::new(SourceId::cpu_dataset(), Utc::now()).with_pairs(i5_750());
        let out = CpuDatasetAdapter::default().adapt(&page).unwrap();

        assert_eq!(out.records.len(), 1);
        let r = &out.records[0];
        assert_eq!(r.get("Vendor"), Some("Intel"));
        assert_eq!(r.get("Processor Number"), Some("i5-750"));
        assert_eq!(r.get("id"), Some("42915"));
        assert_eq!(r.get("Code Name"), Some("Lynnfield"));
        assert_eq!(r.get("# of Cores"), Some("4"));
        assert_eq!(r.get("name"), Some("Intel Core i5-750 Processor (8M Cache, 2.66 GHz)"));
    }

    #[test]
    fn entries_without_processor_number_are_dropped() {
        let page = PageModel::new(SourceId::cpu_dataset(), Utc::now())
            .with_pairs(i5_750())
            .with_pairs([("id", "1"), ("Performance/# of Cores", "1")]);
        let out = CpuDatasetAdapter::default().adapt(&page).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records_dropped, 1);
    }

    #[test]
    fn foreign_dumps_fail() {
        let page = PageModel::new(SourceId::cpu_dataset(), Utc::now()).with_pairs([("sku", "X"), ("price", "10")]);
        assert!(CpuDatasetAdapter::default().adapt(&page).is_err());
    }
}
