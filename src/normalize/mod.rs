//! Field normalizer.
//!
//! Maps a source's raw labels and unit-bearing strings into the canonical
//! schema of the record's component kind. Unknown labels are ignored and
//! reported as unmapped; values that cannot be coerced become absent fields
//! plus a [`FieldParseWarning`]. Nothing here can fail a run.

pub mod registry;
pub mod units;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::ComponentKind;
use crate::record::{CanonicalRecord, RawRecord};
use crate::schema::{CanonicalField, SizeScale, ValueKind};
use crate::source::{ConfidenceTier, SourceId};
use crate::value::{FieldValue, MarketSegment, SocketType};

pub use registry::{ExtraFieldMapping, FieldMapping, FieldRegistry, FieldRule};
pub use units::{Dimension, MultiValue, Unit};

use units::{clean_text, extract_quantities, is_null_marker};

/// Why a raw value could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ParseFailure {
    /// The cell holds no number where one is required.
    #[error("no number found")]
    NoNumber,

    /// A bare number for a field that has no default unit.
    #[error("no unit given and no default unit configured")]
    MissingUnit,

    /// The unit measures a different quantity than the field.
    #[error("unit '{unit}' is not a {expected}")]
    WrongUnit {
        /// Unit read from the cell, or the field's default unit.
        unit: String,
        /// Quantity the field measures (`frequency`, `data size`).
        expected: String,
    },

    /// The number does not fit the field's value type.
    #[error("value out of range")]
    OutOfRange,

    /// Text that names no known socket or market segment.
    #[error("unrecognized value '{value}'")]
    UnknownValue {
        /// The cleaned cell text.
        value: String,
    },
}

/// A single field on a single record failed coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldParseWarning {
    /// Source of the record.
    pub source_id: SourceId,
    /// Model text of the record, when known.
    pub model: String,
    /// Raw label the value was found under.
    pub label: String,
    /// The cell text, unmodified.
    pub raw_value: String,
    /// Canonical field the label maps to.
    pub field: CanonicalField,
    /// Why coercion failed.
    pub failure: ParseFailure,
}

impl std::fmt::Display for FieldParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} '{}' = {:?}: {}",
            self.source_id, self.model, self.label, self.raw_value, self.failure
        )
    }
}

/// Result of normalizing one raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: CanonicalRecord,
    pub warnings: Vec<FieldParseWarning>,
    /// Raw labels with no registry entry.
    pub unmapped: Vec<String>,
}

/// Maps raw records into canonical records.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    gpu: FieldRegistry,
    cpu: FieldRegistry,
    tiers: HashMap<SourceId, ConfidenceTier>,
}

impl FieldNormalizer {
    /// Creates a normalizer from one registry per kind, in either order.
    #[must_use]
    pub fn new(a: FieldRegistry, b: FieldRegistry) -> Self {
        let (gpu, cpu) = if a.kind() == ComponentKind::Gpu { (a, b) } else { (b, a) };
        Self {
            gpu,
            cpu,
            tiers: HashMap::new(),
        }
    }

    /// Overrides the confidence tier of a source.
    #[must_use]
    pub fn with_tier(mut self, source: SourceId, tier: ConfidenceTier) -> Self {
        self.tiers.insert(source, tier);
        self
    }

    /// The registry for a kind.
    #[must_use]
    pub const fn registry(&self, kind: ComponentKind) -> &FieldRegistry {
        match kind {
            ComponentKind::Gpu => &self.gpu,
            ComponentKind::Cpu => &self.cpu,
        }
    }

    /// Confidence tier assigned to records from `source`.
    #[must_use]
    pub fn tier(&self, source: &SourceId) -> ConfidenceTier {
        self.tiers
            .get(source)
            .copied()
            .unwrap_or_else(|| source.default_tier())
    }

    /// Normalizes one raw record.
    ///
    /// When two labels map to the same canonical field, the first one (in
    /// label order) that coerces successfully wins.
    #[must_use]
    pub fn normalize(&self, raw: RawRecord) -> Normalized {
        let registry = self.registry(raw.kind);
        let mut record = CanonicalRecord::empty(
            raw.kind,
            raw.source_id.clone(),
            raw.source_fetch_time,
            self.tier(&raw.source_id),
        );
        let mut failures: Vec<(String, String, CanonicalField, ParseFailure)> = Vec::new();
        let mut unmapped = Vec::new();

        for (label, value) in &raw.fields {
            let Some(rule) = registry.lookup(label) else {
                tracing::debug!(source = %raw.source_id, label = %label, "unmapped field label");
                unmapped.push(label.clone());
                continue;
            };
            if !record.is_absent(rule.field) {
                continue;
            }
            match coerce(value, rule) {
                Ok(Some(v)) => {
                    // The registry only holds fields of this kind.
                    let _ = record.set(rule.field, v);
                }
                Ok(None) => {}
                Err(failure) => failures.push((label.clone(), value.clone(), rule.field, failure)),
            }
        }

        let model = record.label().to_string();
        let warnings = failures
            .into_iter()
            // A later label may still have filled the field.
            .filter(|(_, _, field, _)| record.is_absent(*field))
            .map(|(label, raw_value, field, failure)| {
                tracing::warn!(
                    source = %raw.source_id,
                    model = %model,
                    label = %label,
                    raw = %raw_value,
                    %failure,
                    "field parse warning"
                );
                FieldParseWarning {
                    source_id: raw.source_id.clone(),
                    model: model.clone(),
                    label,
                    raw_value,
                    field,
                    failure,
                }
            })
            .collect();

        Normalized {
            record,
            warnings,
            unmapped,
        }
    }
}

/// Coerces one raw value according to a rule.
///
/// Returns `Ok(None)` for placeholder cells (`N/A`, `—`, ...), which are
/// absent rather than malformed.
///
/// # Errors
///
/// Returns the [`ParseFailure`] describing why the value is malformed.
pub fn coerce(raw: &str, rule: &FieldRule) -> Result<Option<FieldValue>, ParseFailure> {
    if is_null_marker(raw) {
        return Ok(None);
    }
    let value = match rule.field.value_kind() {
        ValueKind::Text => FieldValue::Text(clean_text(raw)),
        ValueKind::UpperText => FieldValue::Text(clean_text(raw).to_uppercase()),
        ValueKind::Socket => {
            let first = first_listed(raw);
            let socket = SocketType::parse(&first).ok_or(ParseFailure::UnknownValue { value: first })?;
            FieldValue::Socket(socket)
        }
        ValueKind::Segment => {
            let first = first_listed(raw);
            let segment =
                MarketSegment::parse(&first).ok_or(ParseFailure::UnknownValue { value: first })?;
            FieldValue::Segment(segment)
        }
        ValueKind::Count => FieldValue::Integer(to_integer(reduce(raw, rule, None)?)?),
        ValueKind::Frequency => {
            FieldValue::Integer(to_integer(reduce(raw, rule, Some(Dimension::Frequency))?)?)
        }
        ValueKind::DataSize(scale) => {
            let bytes = reduce(raw, rule, Some(Dimension::DataSize))?;
            let divisor = match scale {
                SizeScale::Kibibytes => Unit::Kib.to_base(),
                SizeScale::Mebibytes => Unit::Mib.to_base(),
            };
            FieldValue::Integer(to_integer(bytes / divisor)?)
        }
        ValueKind::Power => FieldValue::Float(round3(reduce(raw, rule, Some(Dimension::Power))?)),
        ValueKind::Length => FieldValue::Integer(to_integer(reduce(raw, rule, Some(Dimension::Length))?)?),
        ValueKind::BusWidth => FieldValue::Integer(to_integer(reduce(raw, rule, Some(Dimension::Bits))?)?),
        ValueKind::Bandwidth => {
            FieldValue::Float(round3(reduce(raw, rule, Some(Dimension::Bandwidth))?))
        }
    };
    Ok(Some(value))
}

fn first_listed(raw: &str) -> String {
    let cleaned = clean_text(raw);
    cleaned
        .split([',', ';', '/', '|'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Extracts every quantity, converts it to the dimension's base unit and
/// reduces the list per the rule. `None` dimension ignores units.
fn reduce(raw: &str, rule: &FieldRule, dimension: Option<Dimension>) -> Result<f64, ParseFailure> {
    let quantities = extract_quantities(raw);
    if quantities.is_empty() {
        return Err(ParseFailure::NoNumber);
    }

    let mut values = Vec::with_capacity(quantities.len());
    for q in quantities {
        let Some(dim) = dimension else {
            values.push(q.value);
            continue;
        };
        let unit = q.unit.or(rule.default_unit).ok_or(ParseFailure::MissingUnit)?;
        if unit.dimension() != dim {
            return Err(ParseFailure::WrongUnit {
                unit: format!("{unit:?}").to_lowercase(),
                expected: dim.to_string(),
            });
        }
        values.push(q.value * unit.to_base());
    }

    let picked = match rule.multi {
        MultiValue::First => values.first().copied(),
        MultiValue::Max => values.iter().copied().reduce(f64::max),
    };
    picked.ok_or(ParseFailure::NoNumber)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_integer(v: f64) -> Result<i64, ParseFailure> {
    let rounded = v.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded >= i64::MAX as f64 {
        return Err(ParseFailure::OutOfRange);
    }
    Ok(rounded as i64)
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
