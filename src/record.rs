//! Raw and canonical records.
//!
//! Both are transient: created per run, never persisted directly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::ComponentKind;
use crate::schema::{schema, CanonicalField};
use crate::source::{ConfidenceTier, SourceId};
use crate::value::FieldValue;

/// One component as observed in one source, in that source's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: SourceId,
    pub source_fetch_time: DateTime<Utc>,
    pub kind: ComponentKind,
    /// Source-specific label → raw value.
    pub fields: BTreeMap<String, String>,
}

impl RawRecord {
    #[must_use]
    pub fn new(source_id: SourceId, source_fetch_time: DateTime<Utc>, kind: ComponentKind) -> Self {
        Self {
            source_id,
            source_fetch_time,
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Sets a field. Blank values are not stored; a label seen twice keeps
    /// its first non-blank value.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        self.fields.entry(label.into()).or_insert(value);
    }

    /// Builder form of [`RawRecord::insert`].
    #[must_use]
    pub fn with(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(label, value);
        self
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }

    /// True when `label` is present with a non-blank value.
    #[must_use]
    pub fn has(&self, label: &str) -> bool {
        self.get(label).is_some_and(|v| !v.trim().is_empty())
    }
}

/// One component in the canonical schema.
///
/// Every field of the kind's schema has a slot. A slot holding `None` is
/// explicitly absent: the source did not supply it or the value could not
/// be coerced. Absent fields never take part in conflict comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub kind: ComponentKind,
    pub source_id: SourceId,
    pub source_fetch_time: DateTime<Utc>,
    pub confidence: ConfidenceTier,
    fields: BTreeMap<CanonicalField, Option<FieldValue>>,
}

impl CanonicalRecord {
    /// Creates a record with every schema field absent.
    #[must_use]
    pub fn empty(
        kind: ComponentKind,
        source_id: SourceId,
        source_fetch_time: DateTime<Utc>,
        confidence: ConfidenceTier,
    ) -> Self {
        Self {
            kind,
            source_id,
            source_fetch_time,
            confidence,
            fields: schema(kind).iter().map(|f| (*f, None)).collect(),
        }
    }

    /// Sets a field value. Fields outside the kind's schema are rejected
    /// and returned unchanged as `Err`.
    pub fn set(&mut self, field: CanonicalField, value: FieldValue) -> Result<(), FieldValue> {
        match self.fields.get_mut(&field) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Builder form of [`CanonicalRecord::set`]; out-of-schema fields are
    /// ignored.
    #[must_use]
    pub fn with(mut self, field: CanonicalField, value: impl Into<FieldValue>) -> Self {
        let _ = self.set(field, value.into());
        self
    }

    /// Marks a field absent.
    pub fn clear(&mut self, field: CanonicalField) {
        if let Some(slot) = self.fields.get_mut(&field) {
            *slot = None;
        }
    }

    /// The value of a field, or `None` when absent or outside the schema.
    #[must_use]
    pub fn get(&self, field: CanonicalField) -> Option<&FieldValue> {
        self.fields.get(&field).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn is_absent(&self, field: CanonicalField) -> bool {
        self.get(field).is_none()
    }

    /// Text value of a field.
    #[must_use]
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Present fields in schema order.
    pub fn present(&self) -> impl Iterator<Item = (CanonicalField, &FieldValue)> {
        self.fields
            .iter()
            .filter_map(|(f, v)| v.as_ref().map(|v| (*f, v)))
    }

    /// Absent fields in schema order.
    pub fn absent(&self) -> impl Iterator<Item = CanonicalField> + '_ {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(f, _)| *f)
    }

    /// Display label for logs: the model text, or `"<unknown>"`.
    #[must_use]
    pub fn label(&self) -> &str {
        self.text(CanonicalField::Model).unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CanonicalRecord {
        CanonicalRecord::empty(
            ComponentKind::Gpu,
            SourceId::gpu_encyclopedia(),
            Utc::now(),
            ConfidenceTier::Curated,
        )
    }

    #[test]
    fn empty_record_has_every_schema_field_absent() {
        let r = record();
        assert_eq!(r.present().count(), 0);
        assert_eq!(r.absent().count(), schema(ComponentKind::Gpu).len());
        assert!(r.is_absent(CanonicalField::VramMb));
    }

    #[test]
    fn out_of_schema_fields_are_rejected() {
        let mut r = record();
        assert!(r.set(CanonicalField::Socket, FieldValue::text("LGA1700")).is_err());
        assert!(r.get(CanonicalField::Socket).is_none());
        assert!(r.set(CanonicalField::VramMb, FieldValue::Integer(8192)).is_ok());
        assert_eq!(r.get(CanonicalField::VramMb), Some(&FieldValue::Integer(8192)));
    }

    #[test]
    fn raw_record_keeps_first_non_blank_value() {
        let raw = RawRecord::new(SourceId::cpu_dataset(), Utc::now(), ComponentKind::Cpu)
            .with("Cores", "")
            .with("Cores", "4")
            .with("Cores", "8");
        assert_eq!(raw.get("Cores"), Some("4"));
        assert!(raw.has("Cores"));
        assert!(!raw.has("Threads"));
    }
}
