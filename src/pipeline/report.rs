//! Run report.
//!
//! Everything that went wrong below the level of a whole source ends up
//! here instead of aborting the run: parse warnings, unresolved identities,
//! resolved conflicts. Counts are kept per source and are complete even
//! when some sources failed.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::component::ComponentKind;
use crate::error::SourceStructureError;
use crate::identity::UnresolvedIdentityWarning;
use crate::merge::ConflictResolved;
use crate::normalize::FieldParseWarning;
use crate::source::SourceId;

/// Counts for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Pages handed to the adapter.
    pub pages: usize,
    /// Pages left out because an earlier page of this source failed its
    /// structure check.
    pub pages_skipped: usize,
    /// Pages left out because they were fetched before `since`.
    pub pages_outdated: usize,
    /// Rows that were not component entries.
    pub rows_skipped: usize,
    /// Component rows without a vendor or a model.
    pub records_dropped: usize,
    /// Raw records that went through normalization.
    pub records_processed: usize,
    /// Fields that failed coercion.
    pub field_warnings: usize,
    /// Records that could not be keyed.
    pub unresolved: usize,
    /// Records whose merge resolved at least one conflict.
    pub conflicted: usize,
    pub entries_created: usize,
    pub entries_updated: usize,
    pub entries_unchanged: usize,
    /// Merges that failed in the catalog.
    pub merge_failures: usize,
    /// Pages rejected as unrecognizable.
    pub structure_failures: Vec<SourceStructureError>,
}

impl SourceReport {
    /// True when at least one page of this source was rejected.
    #[must_use]
    pub fn failed(&self) -> bool {
        !self.structure_failures.is_empty()
    }

    fn add(&mut self, other: &Self) {
        self.pages += other.pages;
        self.pages_skipped += other.pages_skipped;
        self.pages_outdated += other.pages_outdated;
        self.rows_skipped += other.rows_skipped;
        self.records_dropped += other.records_dropped;
        self.records_processed += other.records_processed;
        self.field_warnings += other.field_warnings;
        self.unresolved += other.unresolved;
        self.conflicted += other.conflicted;
        self.entries_created += other.entries_created;
        self.entries_updated += other.entries_updated;
        self.entries_unchanged += other.entries_unchanged;
        self.merge_failures += other.merge_failures;
        self.structure_failures
            .extend(other.structure_failures.iter().cloned());
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Kind filter the run was invoked with, if any.
    pub kind: Option<ComponentKind>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: BTreeMap<SourceId, SourceReport>,
    pub field_warnings: Vec<FieldParseWarning>,
    pub unresolved: Vec<UnresolvedIdentityWarning>,
    pub conflicts: Vec<ConflictResolved>,
    /// Catalog errors, one per failed merge.
    pub storage_errors: Vec<String>,
    /// True when the run stopped early on cancellation.
    pub cancelled: bool,
}

impl RunReport {
    /// An empty report for a run starting now.
    #[must_use]
    pub fn new(kind: Option<ComponentKind>) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            kind,
            started_at: now,
            finished_at: now,
            sources: BTreeMap::new(),
            field_warnings: Vec::new(),
            unresolved: Vec::new(),
            conflicts: Vec::new(),
            storage_errors: Vec::new(),
            cancelled: false,
        }
    }

    /// Counts for `source`, created on first use.
    pub fn source_mut(&mut self, source: &SourceId) -> &mut SourceReport {
        self.sources.entry(source.clone()).or_default()
    }

    /// Counts for `source`.
    #[must_use]
    pub fn source(&self, source: &SourceId) -> Option<&SourceReport> {
        self.sources.get(source)
    }

    /// Sum of every source's counts.
    #[must_use]
    pub fn totals(&self) -> SourceReport {
        let mut total = SourceReport::default();
        for report in self.sources.values() {
            total.add(report);
        }
        total
    }

    /// True when any source raised a [`SourceStructureError`].
    #[must_use]
    pub fn has_structure_failures(&self) -> bool {
        self.sources.values().any(SourceReport::failed)
    }

    /// Process exit code: non-zero exactly when some source failed
    /// structurally.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_structure_failures())
    }

    /// Emits the run summary at `info`.
    pub fn log_summary(&self) {
        let total = self.totals();
        info!(
            run_id = %self.run_id,
            sources = self.sources.len(),
            processed = total.records_processed,
            created = total.entries_created,
            updated = total.entries_updated,
            unchanged = total.entries_unchanged,
            unresolved = total.unresolved,
            conflicts = self.conflicts.len(),
            field_warnings = self.field_warnings.len(),
            failed_sources = self.sources.values().filter(|s| s.failed()).count(),
            cancelled = self.cancelled,
            "Pipeline run finished"
        );
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}", self.run_id)?;
        for (source, r) in &self.sources {
            writeln!(
                f,
                "  {source}: {} processed, {} created, {} updated, {} unchanged, {} skipped rows, {} dropped, {} unresolved, {} conflicted",
                r.records_processed,
                r.entries_created,
                r.entries_updated,
                r.entries_unchanged,
                r.rows_skipped,
                r.records_dropped,
                r.unresolved,
                r.conflicted
            )?;
            for failure in &r.structure_failures {
                writeln!(f, "    FAILED: {failure}")?;
            }
        }
        if self.cancelled {
            writeln!(f, "  cancelled before completion")?;
        }
        Ok(())
    }
}
