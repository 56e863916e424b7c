//! Encyclopedia GPU spec tables.
//!
//! Pages are per-vendor lists of GPUs: many tables with multi-level headers
//! flattened into one label per column (`Clock rate (MHz) Core`,
//! `Memory Size (GiB)`). Column meaning is guessed from header keywords and
//! the header's unit is attached to bare cell values.

use std::sync::OnceLock;

use regex::Regex;

use crate::adapter::{AdaptOutcome, RowTally, SourceAdapter};
use crate::component::ComponentKind;
use crate::error::SourceStructureError;
use crate::normalize::units::{clean_text, extract_quantities};
use crate::normalize::{Dimension, FieldMapping, Unit};
use crate::page::{PageModel, PageRow};
use crate::record::RawRecord;
use crate::schema::CanonicalField;
use crate::source::SourceId;

const VENDOR: &str = "vendor";
const MODEL: &str = "model";

/// Labels emitted by [`GpuEncyclopediaAdapter`].
pub const FIELD_MAP: &[FieldMapping] = &[
    FieldMapping::new(VENDOR, CanonicalField::Vendor),
    FieldMapping::new(MODEL, CanonicalField::Model),
    FieldMapping::new("codename", CanonicalField::Codename),
    FieldMapping::new("launch", CanonicalField::Launch),
    FieldMapping::new("core_clock", CanonicalField::CoreClockMhz).unit(Unit::Mhz),
    FieldMapping::new("boost_clock", CanonicalField::BoostClockMhz).unit(Unit::Mhz).max(),
    FieldMapping::new("memory_size", CanonicalField::VramMb).unit(Unit::Gib).max(),
    FieldMapping::new("memory_clock", CanonicalField::MemoryClockMhz).unit(Unit::Mhz),
    FieldMapping::new("memory_type", CanonicalField::MemoryType),
    FieldMapping::new("memory_bus_width", CanonicalField::MemoryBusWidthBits).unit(Unit::Bit).max(),
    FieldMapping::new("memory_bandwidth", CanonicalField::MemoryBandwidthGbs).unit(Unit::GbPerS).max(),
    FieldMapping::new("shaders", CanonicalField::ShaderCount),
    FieldMapping::new("tdp", CanonicalField::TdpW).unit(Unit::Watt).max(),
    FieldMapping::new("fab", CanonicalField::ProcessNm).unit(Unit::Nanometer),
];

/// What a column header was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Model,
    Vendor,
    Codename,
    Launch,
    CoreClock,
    BoostClock,
    MemorySize,
    MemoryClock,
    MemoryType,
    MemoryBusWidth,
    MemoryBandwidth,
    Shaders,
    Tdp,
    Fab,
}

impl Column {
    const fn label(self) -> &'static str {
        match self {
            Self::Model => MODEL,
            Self::Vendor => VENDOR,
            Self::Codename => "codename",
            Self::Launch => "launch",
            Self::CoreClock => "core_clock",
            Self::BoostClock => "boost_clock",
            Self::MemorySize => "memory_size",
            Self::MemoryClock => "memory_clock",
            Self::MemoryType => "memory_type",
            Self::MemoryBusWidth => "memory_bus_width",
            Self::MemoryBandwidth => "memory_bandwidth",
            Self::Shaders => "shaders",
            Self::Tdp => "tdp",
            Self::Fab => "fab",
        }
    }
}

fn header_unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").expect("static regex"))
}

/// First parenthesized token in a header that names a unit.
fn header_unit(header: &str) -> Option<&str> {
    header_unit_re()
        .captures_iter(header)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .find(|token| Unit::parse(token).is_some())
}

fn has_any(h: &str, words: &[&str]) -> bool {
    words.iter().any(|w| h.contains(w))
}

fn classify(header: &str) -> Option<Column> {
    let h = clean_text(header).to_lowercase();
    let unit = header_unit(&h).and_then(Unit::parse);
    let is_freq = unit.is_some_and(|u| u.dimension() == Dimension::Frequency);
    let is_size = unit.is_some_and(|u| u.dimension() == Dimension::DataSize);
    let is_power = unit.is_some_and(|u| u.dimension() == Dimension::Power);
    let is_length = unit.is_some_and(|u| u.dimension() == Dimension::Length);

    let column = if h == "vendor" || h == "brand" || h == "manufacturer" {
        Column::Vendor
    } else if h.starts_with("model") {
        Column::Model
    } else if h.contains("code") {
        Column::Codename
    } else if has_any(&h, &["name", "product"]) {
        Column::Model
    } else if has_any(&h, &["launch", "release"]) && !h.contains("price") {
        Column::Launch
    } else if h.contains("bandwidth") {
        Column::MemoryBandwidth
    } else if h.contains("bus width") || (h.contains("memory") && h.contains("width")) {
        Column::MemoryBusWidth
    } else if is_size && has_any(&h, &["size", "dvmt", "vram", "memory"]) && !h.contains("die") {
        Column::MemorySize
    } else if h.contains("memory") && h.contains("type") {
        Column::MemoryType
    } else if h.contains("memory") && (is_freq || has_any(&h, &["clock", "rate"])) {
        Column::MemoryClock
    } else if h.contains("shader") && (is_freq || h.contains("clock")) {
        return None;
    } else if has_any(&h, &["boost", "turbo"]) {
        Column::BoostClock
    } else if has_any(&h, &["core", "average", "base", "max", "clock"])
        && (is_freq || h.contains("clock"))
    {
        Column::CoreClock
    } else if has_any(&h, &["shader", "core config", "cuda", "stream processor", "cores"]) {
        Column::Shaders
    } else if has_any(&h, &["tdp", "tbp"]) || (h.contains("power") && is_power) {
        Column::Tdp
    } else if has_any(&h, &["fab", "lithography"]) || (h.contains("process") && is_length) {
        Column::Fab
    } else {
        return None;
    };
    Some(column)
}

/// Appends the header's unit to a value that carries numbers but no unit.
fn with_header_unit(value: &str, unit: Option<&str>) -> String {
    let Some(unit) = unit else {
        return value.to_string();
    };
    let quantities = extract_quantities(value);
    if !quantities.is_empty() && quantities.iter().all(|q| q.unit.is_none() && !q.unknown_unit) {
        format!("{value} {unit}")
    } else {
        value.to_string()
    }
}

/// Adapter for the encyclopedia's per-vendor GPU lists.
///
/// Any other source publishing the same table layout (a mirror, a vendor
/// spec sheet exported as a table) can reuse it under its own id.
#[derive(Debug, Clone)]
pub struct GpuEncyclopediaAdapter {
    source: SourceId,
    tolerance: f64,
}

impl Default for GpuEncyclopediaAdapter {
    fn default() -> Self {
        Self::for_source(SourceId::gpu_encyclopedia())
    }
}

impl GpuEncyclopediaAdapter {
    /// Reads GPU tables published by `source`.
    #[must_use]
    pub const fn for_source(source: SourceId) -> Self {
        Self {
            source,
            tolerance: 0.75,
        }
    }

    /// Sets the maximum share of skipped rows before the page is rejected.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn skip_reason(row: &PageRow) -> Option<&'static str> {
        let filled: Vec<&str> = row
            .cells()
            .iter()
            .filter(|c| !c.is_blank())
            .map(|c| c.value.trim())
            .collect();
        if filled.is_empty() {
            return Some("blank");
        }
        if filled.len() == 1 && row.len() > 1 {
            return Some("caption or footnote");
        }
        if filled.len() > 1 && filled.iter().all(|v| v.eq_ignore_ascii_case(filled[0])) {
            return Some("separator");
        }
        let header_like = row
            .cells()
            .iter()
            .filter(|c| !c.is_blank() && clean_text(&c.value).eq_ignore_ascii_case(&clean_text(&c.label)))
            .count();
        if header_like * 2 > filled.len() {
            return Some("repeated header");
        }
        let first = clean_text(filled[0]).to_lowercase();
        if first.is_empty() || first.starts_with('^') || first.starts_with('*') || first.starts_with("note") {
            return Some("footnote");
        }
        None
    }
}

impl SourceAdapter for GpuEncyclopediaAdapter {
    fn source_id(&self) -> SourceId {
        self.source.clone()
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Gpu
    }

    fn field_map(&self) -> &'static [FieldMapping] {
        FIELD_MAP
    }

    fn adapt(&self, page: &PageModel) -> Result<AdaptOutcome, SourceStructureError> {
        let mut tally = RowTally::start(page, self.tolerance)?;

        let has_spec_column = page.rows.iter().flat_map(PageRow::cells).any(|c| {
            classify(&c.label).is_some_and(|col| {
                !matches!(col, Column::Model | Column::Vendor | Column::Codename | Column::Launch)
            })
        });
        if !has_spec_column {
            return Err(SourceStructureError::MissingColumn {
                source_id: page.source_id.clone(),
                column: "clock or memory specification".to_string(),
            });
        }

        let page_vendor = page.context_value("vendor");

        for (idx, row) in page.rows.iter().enumerate() {
            if let Some(why) = Self::skip_reason(row) {
                tally.skip(idx, why);
                continue;
            }

            let mut record = RawRecord::new(page.source_id.clone(), page.fetched_at, ComponentKind::Gpu);
            if let Some(vendor) = page_vendor {
                record.insert(VENDOR, vendor);
            }
            let mut has_model_column = false;
            for cell in row.cells() {
                match classify(&cell.label) {
                    Some(col) => {
                        has_model_column |= col == Column::Model;
                        let unit = header_unit(&cell.label);
                        record.insert(col.label(), with_header_unit(&cell.value, unit));
                    }
                    None => record.insert(clean_text(&cell.label), cell.value.clone()),
                }
            }
            // The model is the first column when no header names it.
            if !has_model_column {
                if let Some(first) = row.cells().first() {
                    record.insert(MODEL, first.value.clone());
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

    fn page() -> PageModel {
        PageModel::new(SourceId::gpu_encyclopedia(), Utc::now()).with_context("vendor", "NVIDIA")
    }

    #[test]
    fn headers_are_classified_by_keyword() {
        assert_eq!(classify("Model"), Some(Column::Model));
        assert_eq!(classify("Code name"), Some(Column::Codename));
        assert_eq!(classify("Clock rate Core (MHz)"), Some(Column::CoreClock));
        assert_eq!(classify("Clock rate Boost (MHz)"), Some(Column::BoostClock));
        assert_eq!(classify("Memory Size (GiB)"), Some(Column::MemorySize));
        assert_eq!(classify("Memory Bandwidth (GB/s)"), Some(Column::MemoryBandwidth));
        assert_eq!(classify("Memory Bus width (bit)"), Some(Column::MemoryBusWidth));
        assert_eq!(classify("Memory Bus type"), Some(Column::MemoryType));
        assert_eq!(classify("Core config"), Some(Column::Shaders));
        assert_eq!(classify("TDP (Watts)"), Some(Column::Tdp));
        assert_eq!(classify("Fab (nm)"), Some(Column::Fab));
        assert_eq!(classify("Launch"), Some(Column::Launch));
        assert_eq!(classify("Release price (USD)"), None);
        assert_eq!(classify("Die size (mm2)"), None);
        assert_eq!(classify("Processing power (GFLOPS)"), None);
        assert_eq!(classify("Power (W)"), Some(Column::Tdp));
        assert_eq!(classify("Process (nm)"), Some(Column::Fab));
        assert_eq!(classify("Bus interface"), None);
    }

    #[test]
    fn header_unit_is_attached_to_bare_values() {
        assert_eq!(header_unit("Core clock (MHz)"), Some("MHz"));
        assert_eq!(header_unit("Model (codename)"), None);
        assert_eq!(with_header_unit("1440\n1710", Some("MHz")), "1440\n1710 MHz");
        assert_eq!(with_header_unit("2.52 GHz", Some("MHz")), "2.52 GHz");
        assert_eq!(with_header_unit("N/A", Some("MHz")), "N/A");
    }

    #[test]
    fn component_rows_become_records() {
        let page = page()
            .with_pairs([("Model", "GeForce RTX 4090"), ("Clock rate Boost (MHz)", "2520"), ("Memory Size (GB)", "24")])
            .with_pairs([("Model", "GeForce RTX 4080"), ("Clock rate Boost (MHz)", "2505"), ("Memory Size (GB)", "16")]);
        let out = GpuEncyclopediaAdapter::default().adapt(&page).unwrap();

        assert_eq!(out.records.len(), 2);
        let first = &out.records[0];
        assert_eq!(first.get("vendor"), Some("NVIDIA"));
        assert_eq!(first.get("model"), Some("GeForce RTX 4090"));
        assert_eq!(first.get("boost_clock"), Some("2520 MHz"));
        assert_eq!(first.get("memory_size"), Some("24 GB"));
    }

    #[test]
    fn noise_rows_are_skipped_and_counted() {
        let page = page()
            .with_pairs([("Model", "GeForce 40 series"), ("Core clock (MHz)", "GeForce 40 series")])
            .with_pairs([("Model", "Model"), ("Core clock (MHz)", "Core clock (MHz)")])
            .with_pairs([("Model", "RTX 4070"), ("Core clock (MHz)", "1920")])
            .with_pairs([("Model", "[a] Boost values are typical"), ("Core clock (MHz)", "")]);
        let out = GpuEncyclopediaAdapter::default().adapt(&page).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.rows_skipped, 3);
    }

    #[test]
    fn rows_without_vendor_are_dropped() {
        let page = PageModel::new(SourceId::gpu_encyclopedia(), Utc::now())
            .with_pairs([("Model", "Mystery GPU"), ("Core clock (MHz)", "900")]);
        let out = GpuEncyclopediaAdapter::default().adapt(&page).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.records_dropped, 1);
    }

    #[test]
    fn unrecognizable_pages_fail() {
        let page = page().with_pairs([("Title", "List of graphics cards"), ("Year", "2024")]);
        let err = GpuEncyclopediaAdapter::default().adapt(&page).unwrap_err();
        assert!(matches!(err, SourceStructureError::MissingColumn { .. }));
    }
}
