//! Catalog entries and per-field provenance.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::CatalogKey;
use crate::schema::CanonicalField;
use crate::source::{ConfidenceTier, SourceId};
use crate::value::FieldValue;

/// Why a value stopped being the current one (or never became it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersedeReason {
    /// Lost a conflict against a higher-priority source.
    LowerPriority,
    /// Lost an equal-priority conflict against a more recent fetch.
    OlderOnTie,
    /// Equal priority and equal fetch time; the existing value was kept.
    TieKeptExisting,
    /// Replaced by a strictly newer observation from the same source.
    Replaced,
    /// An older observation from the same source than the current value.
    Stale,
    /// Same source, same fetch time, different value; the existing value
    /// was kept.
    SameTimeDisagreement,
}

impl fmt::Display for SupersedeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LowerPriority => "lower priority",
            Self::OlderOnTie => "older on priority tie",
            Self::TieKeptExisting => "tie, existing kept",
            Self::Replaced => "replaced by newer observation",
            Self::Stale => "stale observation",
            Self::SameTimeDisagreement => "same-time disagreement",
        };
        f.write_str(s)
    }
}

/// A value that lost, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupersededValue {
    pub value: FieldValue,
    pub source: SourceId,
    pub fetched_at: DateTime<Utc>,
    pub reason: SupersedeReason,
}

impl SupersededValue {
    /// Two records describe the same observation if everything but the
    /// reason matches.
    fn same_observation(&self, other: &Self) -> bool {
        self.source == other.source && self.fetched_at == other.fetched_at && self.value == other.value
    }
}

/// Where the current value of a field came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Source of the current value.
    pub source: SourceId,
    /// Fetch time of the observation the current value came from.
    pub fetched_at: DateTime<Utc>,
    pub confidence: ConfidenceTier,
    /// Other sources that observed an agreeing value, with their latest
    /// fetch time.
    #[serde(default)]
    pub corroborations: BTreeMap<SourceId, DateTime<Utc>>,
    /// Losing values, oldest first, de-duplicated and bounded.
    #[serde(default)]
    pub superseded: Vec<SupersededValue>,
}

impl FieldProvenance {
    #[must_use]
    pub fn new(source: SourceId, fetched_at: DateTime<Utc>, confidence: ConfidenceTier) -> Self {
        Self {
            source,
            fetched_at,
            confidence,
            corroborations: BTreeMap::new(),
            superseded: Vec::new(),
        }
    }

    /// Records a losing value. Repeats of an already recorded observation
    /// are ignored; beyond `limit` the oldest records are evicted.
    ///
    /// Returns `false` when the observation was already recorded.
    pub fn push_superseded(&mut self, value: SupersededValue, limit: usize) -> bool {
        if self.superseded.iter().any(|s| s.same_observation(&value)) {
            return false;
        }
        self.superseded.push(value);
        if self.superseded.len() > limit {
            let excess = self.superseded.len() - limit;
            self.superseded.drain(..excess);
        }
        true
    }

    /// Records that `source` observed an agreeing value at `at`.
    pub fn corroborate(&mut self, source: SourceId, at: DateTime<Utc>) {
        if source == self.source {
            return;
        }
        let slot = self.corroborations.entry(source).or_insert(at);
        if at > *slot {
            *slot = at;
        }
    }
}

/// One field of an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryField {
    pub value: FieldValue,
    pub provenance: FieldProvenance,
}

/// The merged catalog record for one key.
///
/// Fields missing from `fields` have never been observed. Every present
/// value traces to the record named in its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: CatalogKey,
    pub fields: BTreeMap<CanonicalField, EntryField>,
    /// Earliest fetch time of any merged record.
    pub first_seen: DateTime<Utc>,
    /// Latest fetch time of any merged record.
    pub last_seen: DateTime<Utc>,
    /// Incremented on every merge that changed the entry.
    pub revision: u64,
}

impl CatalogEntry {
    /// An entry with no fields, first observed at `seen`.
    #[must_use]
    pub fn new(key: CatalogKey, seen: DateTime<Utc>) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
            first_seen: seen,
            last_seen: seen,
            revision: 0,
        }
    }

    /// Current value of a field.
    #[must_use]
    pub fn get(&self, field: CanonicalField) -> Option<&FieldValue> {
        self.fields.get(&field).map(|f| &f.value)
    }

    /// Current value and provenance of a field.
    #[must_use]
    pub fn field(&self, field: CanonicalField) -> Option<&EntryField> {
        self.fields.get(&field)
    }

    /// Integer value of a field.
    #[must_use]
    pub fn integer(&self, field: CanonicalField) -> Option<i64> {
        self.get(field).and_then(FieldValue::as_integer)
    }

    /// Text value of a field.
    #[must_use]
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Widens the observation window to include `at`.
    pub fn observe(&mut self, at: DateTime<Utc>) {
        if at < self.first_seen {
            self.first_seen = at;
        }
        if at > self.last_seen {
            self.last_seen = at;
        }
    }

    /// Plain `field → value` view, without provenance.
    #[must_use]
    pub fn flatten(&self) -> BTreeMap<CanonicalField, FieldValue> {
        self.fields
            .iter()
            .map(|(f, e)| (*f, e.value.clone()))
            .collect()
    }

    /// Flat JSON export: the key plus one member per present field.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert("key".to_string(), serde_json::Value::String(self.key.to_string()));
        object.insert("revision".to_string(), serde_json::Value::from(self.revision));
        for (field, value) in self.flatten() {
            let json = match value {
                FieldValue::Integer(i) => serde_json::Value::from(i),
                FieldValue::Float(f) => serde_json::Value::from(f),
                FieldValue::Text(s) => serde_json::Value::String(s),
                other => serde_json::Value::String(other.to_string()),
            };
            object.insert(field.name().to_string(), json);
        }
        serde_json::Value::Object(object)
    }
}
