//! Merge engine.
//!
//! Folds one [`CanonicalRecord`] into the catalog entry for its key, field
//! by field, keeping provenance for every value. The merge is idempotent:
//! merging the same record again leaves the entry byte-for-byte identical,
//! so a failed run is recovered by simply running again.
//!
//! Per present incoming field:
//! - the entry has no value: the incoming value is adopted;
//! - the values agree: the entry keeps its value, the incoming source is
//!   recorded as corroborating, and the provenance moves to whichever
//!   source ranks higher;
//! - the values disagree and come from different sources: the higher
//!   ranked source wins, equal ranks go to the more recent fetch, and equal
//!   fetch times keep the existing value;
//! - the values disagree and come from the same source: a strictly newer
//!   observation replaces the value, an older one is recorded as stale.
//!
//! Absent incoming fields are skipped entirely.

pub mod conflict;
pub mod policy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, CatalogEntry, EntryField, FieldProvenance, StorageError, SupersedeReason, SupersededValue};
use crate::component::ComponentKind;
use crate::identity::CatalogKey;
use crate::record::CanonicalRecord;
use crate::schema::CanonicalField;
use crate::source::{ConfidenceTier, SourceId};
use crate::value::FieldValue;

pub use conflict::{ConflictResolved, Observation, Resolution, TieBreak};
pub use policy::{default_priorities, KindPriorities, MergePolicy, DEFAULT_FLOAT_TOLERANCE, DEFAULT_MAX_SUPERSEDED};

/// What a merge did to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// The key had no entry; one was created.
    Created,
    /// The entry changed and its revision was incremented.
    Updated,
    /// The record added nothing new.
    Unchanged,
}

/// Result of merging one record.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub key: CatalogKey,
    pub status: EntryStatus,
    /// Revision of the entry after the merge.
    pub revision: u64,
    /// Cross-source disagreements newly resolved by this merge.
    pub conflicts: Vec<ConflictResolved>,
    /// Incoming values newly recorded as stale same-source observations.
    pub stale_fields: usize,
}

impl MergeOutcome {
    fn unchanged(key: CatalogKey, revision: u64) -> Self {
        Self {
            key,
            status: EntryStatus::Unchanged,
            revision,
            conflicts: Vec::new(),
            stale_fields: 0,
        }
    }
}

/// The incoming side of a field merge.
struct Incoming<'a> {
    kind: ComponentKind,
    value: &'a FieldValue,
    source: &'a SourceId,
    fetched_at: DateTime<Utc>,
    confidence: ConfidenceTier,
}

impl Incoming<'_> {
    fn provenance(&self) -> FieldProvenance {
        FieldProvenance::new(self.source.clone(), self.fetched_at, self.confidence)
    }

    fn observation(&self) -> Observation {
        Observation {
            value: self.value.clone(),
            source: self.source.clone(),
            fetched_at: self.fetched_at,
        }
    }

    fn superseded(&self, reason: SupersedeReason) -> SupersededValue {
        SupersededValue {
            value: self.value.clone(),
            source: self.source.clone(),
            fetched_at: self.fetched_at,
            reason,
        }
    }
}

fn current_observation(slot: &EntryField) -> Observation {
    Observation {
        value: slot.value.clone(),
        source: slot.provenance.source.clone(),
        fetched_at: slot.provenance.fetched_at,
    }
}

fn current_superseded(slot: &EntryField, reason: SupersedeReason) -> SupersededValue {
    SupersededValue {
        value: slot.value.clone(),
        source: slot.provenance.source.clone(),
        fetched_at: slot.provenance.fetched_at,
        reason,
    }
}

#[derive(Default)]
struct FieldReport {
    conflicts: Vec<ConflictResolved>,
    stale: usize,
}

/// Merges canonical records into a [`Catalog`] under a [`MergePolicy`].
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    policy: MergePolicy,
}

impl MergeEngine {
    #[must_use]
    pub const fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Merges `record` into the entry for `key`.
    ///
    /// Runs under the catalog's per-key lock, so concurrent merges of the
    /// same key are serialized and each sees the other's result.
    ///
    /// # Errors
    /// Propagates the catalog's [`StorageError`].
    pub fn merge(
        &self,
        key: &CatalogKey,
        record: &CanonicalRecord,
        catalog: &dyn Catalog,
    ) -> Result<MergeOutcome, StorageError> {
        let mut outcome = MergeOutcome::unchanged(key.clone(), 0);
        catalog.upsert_with(key, &mut |current| {
            let (next, result) = self.apply(key, record, current);
            outcome = result;
            next
        })?;

        for conflict in &outcome.conflicts {
            debug!(
                key = %conflict.key,
                field = %conflict.field,
                winner = %conflict.winner.source,
                loser = %conflict.loser.source,
                resolution = %conflict.resolution,
                "Resolved field conflict"
            );
        }
        Ok(outcome)
    }

    /// Computes the merged entry without touching any catalog. Returns
    /// `None` as the entry when nothing changed.
    #[must_use]
    pub fn apply(
        &self,
        key: &CatalogKey,
        record: &CanonicalRecord,
        current: Option<&CatalogEntry>,
    ) -> (Option<CatalogEntry>, MergeOutcome) {
        let Some(existing) = current else {
            let mut entry = CatalogEntry::new(key.clone(), record.source_fetch_time);
            for (field, value) in record.present() {
                let incoming = self.incoming(record, value);
                entry.fields.insert(
                    field,
                    EntryField {
                        value: value.clone(),
                        provenance: incoming.provenance(),
                    },
                );
            }
            entry.revision = 1;
            let outcome = MergeOutcome {
                key: key.clone(),
                status: EntryStatus::Created,
                revision: entry.revision,
                conflicts: Vec::new(),
                stale_fields: 0,
            };
            return (Some(entry), outcome);
        };

        let mut next = existing.clone();
        let mut report = FieldReport::default();
        for (field, value) in record.present() {
            let incoming = self.incoming(record, value);
            match next.fields.get_mut(&field) {
                None => {
                    next.fields.insert(
                        field,
                        EntryField {
                            value: value.clone(),
                            provenance: incoming.provenance(),
                        },
                    );
                }
                Some(slot) => self.merge_field(key, field, slot, &incoming, &mut report),
            }
        }
        next.observe(record.source_fetch_time);

        if next == *existing {
            return (None, MergeOutcome::unchanged(key.clone(), existing.revision));
        }
        next.revision = existing.revision + 1;
        let outcome = MergeOutcome {
            key: key.clone(),
            status: EntryStatus::Updated,
            revision: next.revision,
            conflicts: report.conflicts,
            stale_fields: report.stale,
        };
        (Some(next), outcome)
    }

    fn incoming<'a>(&self, record: &'a CanonicalRecord, value: &'a FieldValue) -> Incoming<'a> {
        Incoming {
            kind: record.kind,
            value,
            source: &record.source_id,
            fetched_at: record.source_fetch_time,
            confidence: record.confidence,
        }
    }

    fn merge_field(
        &self,
        key: &CatalogKey,
        field: CanonicalField,
        slot: &mut EntryField,
        incoming: &Incoming<'_>,
        report: &mut FieldReport,
    ) {
        let limit = self.policy.max_superseded();
        let same_source = slot.provenance.source == *incoming.source;
        let agrees = slot.value.agrees_with(incoming.value, self.policy.float_tolerance());

        if agrees {
            if same_source {
                if incoming.fetched_at > slot.provenance.fetched_at {
                    slot.value = incoming.value.clone();
                    slot.provenance.fetched_at = incoming.fetched_at;
                    slot.provenance.confidence = incoming.confidence;
                }
                return;
            }
            let incoming_rank = self.policy.rank(incoming.kind, field, incoming.source);
            let current_rank = self.policy.rank(incoming.kind, field, &slot.provenance.source);
            if incoming_rank < current_rank {
                let previous_source = slot.provenance.source.clone();
                let previous_at = slot.provenance.fetched_at;
                slot.provenance.corroborations.remove(incoming.source);
                slot.provenance.source = incoming.source.clone();
                slot.provenance.fetched_at = incoming.fetched_at;
                slot.provenance.confidence = incoming.confidence;
                slot.provenance.corroborate(previous_source, previous_at);
                slot.value = incoming.value.clone();
            } else {
                slot.provenance.corroborate(incoming.source.clone(), incoming.fetched_at);
            }
            return;
        }

        if same_source {
            if incoming.fetched_at > slot.provenance.fetched_at {
                let loser = current_superseded(slot, SupersedeReason::Replaced);
                replace(slot, incoming, loser, limit);
            } else {
                let reason = if incoming.fetched_at < slot.provenance.fetched_at {
                    SupersedeReason::Stale
                } else {
                    SupersedeReason::SameTimeDisagreement
                };
                if slot.provenance.push_superseded(incoming.superseded(reason), limit) {
                    report.stale += 1;
                }
            }
            return;
        }

        let incoming_rank = self.policy.rank(incoming.kind, field, incoming.source);
        let current_rank = self.policy.rank(incoming.kind, field, &slot.provenance.source);
        let (incoming_wins, resolution, loser_reason) = if incoming_rank != current_rank {
            (
                incoming_rank < current_rank,
                Resolution::SourcePriority {
                    winner_rank: incoming_rank.min(current_rank),
                    loser_rank: incoming_rank.max(current_rank),
                },
                SupersedeReason::LowerPriority,
            )
        } else if incoming.fetched_at != slot.provenance.fetched_at {
            (
                incoming.fetched_at > slot.provenance.fetched_at,
                Resolution::Tie {
                    tie_break: TieBreak::MostRecent,
                },
                SupersedeReason::OlderOnTie,
            )
        } else {
            (
                false,
                Resolution::Tie {
                    tie_break: TieBreak::KeptExisting,
                },
                SupersedeReason::TieKeptExisting,
            )
        };

        if incoming_wins {
            let conflict = ConflictResolved {
                key: key.clone(),
                field,
                winner: incoming.observation(),
                loser: current_observation(slot),
                resolution,
            };
            let loser = current_superseded(slot, loser_reason);
            replace(slot, incoming, loser, limit);
            report.conflicts.push(conflict);
        } else if slot.provenance.push_superseded(incoming.superseded(loser_reason), limit) {
            report.conflicts.push(ConflictResolved {
                key: key.clone(),
                field,
                winner: current_observation(slot),
                loser: incoming.observation(),
                resolution,
            });
        }
    }
}

/// Installs the incoming value, carrying the superseded history over and
/// appending the displaced value to it.
fn replace(slot: &mut EntryField, incoming: &Incoming<'_>, loser: SupersededValue, limit: usize) {
    let mut provenance = incoming.provenance();
    provenance.superseded = std::mem::take(&mut slot.provenance.superseded);
    provenance.push_superseded(loser, limit);
    slot.value = incoming.value.clone();
    slot.provenance = provenance;
}
