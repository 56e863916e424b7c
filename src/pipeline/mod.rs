//! The extraction → normalization → identity → merge pipeline.
//!
//! The first three stages are pure and run on the caller's thread, one page
//! at a time. Merges go through a [`MergeRuntime`], which serializes merges
//! per key and runs different keys in parallel. Every per-record problem is
//! recovered locally and counted in the [`RunReport`]; a page whose shape is
//! unrecognizable fails its source for the rest of the run and nothing else.

pub mod report;
pub mod runtime;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::adapter::SourceAdapter;
use crate::catalog::Catalog;
use crate::component::ComponentKind;
use crate::config::PipelineConfig;
use crate::error::{ConfigError, RuntimeError, SourceStructureError};
use crate::identity::{CatalogKey, IdentityResolver, UnresolvedIdentityWarning};
use crate::merge::{EntryStatus, MergeEngine};
use crate::normalize::{FieldNormalizer, FieldParseWarning, FieldRegistry};
use crate::page::PageModel;
use crate::record::CanonicalRecord;
use crate::source::SourceId;

pub use report::{RunReport, SourceReport};
pub use runtime::{MergeDone, MergeRuntime, MergeRuntimeConfig};

/// Cooperative cancellation flag shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the run to stop before its next record.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Invocation parameters of one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only process sources of this kind.
    pub kind: Option<ComponentKind>,
    /// Only process these sources; empty means all.
    pub sources: Vec<SourceId>,
    /// Skip pages fetched before this time.
    pub since: Option<DateTime<Utc>>,
    pub cancel: CancellationToken,
}

impl RunOptions {
    #[must_use]
    pub fn kind(mut self, kind: ComponentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn source(mut self, source: SourceId) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn selects(&self, adapter: &dyn SourceAdapter) -> bool {
        self.kind.map_or(true, |k| k == adapter.kind())
            && (self.sources.is_empty() || self.sources.contains(&adapter.source_id()))
    }
}

/// What the pure stages produced from one page.
#[derive(Debug, Clone, Default)]
pub struct PageOutput {
    /// Keyed records, ready to merge, in row order.
    pub records: Vec<(CatalogKey, CanonicalRecord)>,
    pub rows_skipped: usize,
    pub records_dropped: usize,
    /// Raw records normalized, keyed or not.
    pub records_processed: usize,
    pub field_warnings: Vec<FieldParseWarning>,
    pub unresolved: Vec<UnresolvedIdentityWarning>,
}

/// A configured pipeline bound to one catalog.
pub struct Pipeline {
    adapters: BTreeMap<SourceId, Arc<dyn SourceAdapter>>,
    normalizer: FieldNormalizer,
    resolver: IdentityResolver,
    engine: Arc<MergeEngine>,
    catalog: Arc<dyn Catalog>,
    runtime: MergeRuntimeConfig,
}

impl Pipeline {
    /// Builds a pipeline with the adapters named by `config`.
    ///
    /// # Errors
    /// [`ConfigError`] when field tables or configured mappings clash.
    pub fn new(config: &PipelineConfig, catalog: Arc<dyn Catalog>) -> Result<Self, ConfigError> {
        Self::with_adapters(config, config.adapters(), catalog)
    }

    /// Builds a pipeline with an explicit adapter set. A later adapter for
    /// the same source replaces an earlier one.
    ///
    /// # Errors
    /// [`ConfigError`] when field tables or configured mappings clash.
    pub fn with_adapters(
        config: &PipelineConfig,
        adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>,
        catalog: Arc<dyn Catalog>,
    ) -> Result<Self, ConfigError> {
        let adapters: BTreeMap<SourceId, Arc<dyn SourceAdapter>> =
            adapters.into_iter().map(|a| (a.source_id(), a)).collect();

        let mut gpu = FieldRegistry::new(ComponentKind::Gpu);
        let mut cpu = FieldRegistry::new(ComponentKind::Cpu);
        for adapter in adapters.values() {
            let registry = match adapter.kind() {
                ComponentKind::Gpu => &mut gpu,
                ComponentKind::Cpu => &mut cpu,
            };
            registry.register_table(adapter.field_map())?;
        }
        for extra in &config.field_mappings {
            match extra.kind {
                ComponentKind::Gpu => gpu.register_extra(extra)?,
                ComponentKind::Cpu => cpu.register_extra(extra)?,
            }
        }

        let mut normalizer = FieldNormalizer::new(gpu, cpu);
        for (source, tier) in &config.tiers {
            normalizer = normalizer.with_tier(source.clone(), *tier);
        }

        debug!(
            adapters = adapters.len(),
            gpu_labels = normalizer.registry(ComponentKind::Gpu).len(),
            cpu_labels = normalizer.registry(ComponentKind::Cpu).len(),
            "Pipeline configured"
        );

        Ok(Self {
            adapters,
            normalizer,
            resolver: IdentityResolver::new(config.alias_table()),
            engine: Arc::new(MergeEngine::new(config.merge_policy())),
            catalog,
            runtime: config.merge,
        })
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    #[must_use]
    pub const fn normalizer(&self) -> &FieldNormalizer {
        &self.normalizer
    }

    #[must_use]
    pub const fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    #[must_use]
    pub fn engine(&self) -> &MergeEngine {
        &self.engine
    }

    /// Sources this pipeline has adapters for.
    pub fn sources(&self) -> impl Iterator<Item = &SourceId> {
        self.adapters.keys()
    }

    /// Runs the pure stages on one page: adapt, normalize, resolve.
    ///
    /// # Errors
    /// [`SourceStructureError`] when the page's source has no adapter or
    /// the page is unrecognizable.
    pub fn process_page(&self, page: &PageModel) -> Result<PageOutput, SourceStructureError> {
        let adapter = self
            .adapters
            .get(&page.source_id)
            .ok_or_else(|| SourceStructureError::NoAdapter {
                source_id: page.source_id.clone(),
            })?;
        let adapted = adapter.adapt(page)?;

        let mut out = PageOutput {
            rows_skipped: adapted.rows_skipped,
            records_dropped: adapted.records_dropped,
            ..PageOutput::default()
        };
        for raw in adapted.records {
            out.records_processed += 1;
            let normalized = self.normalizer.normalize(raw);
            out.field_warnings.extend(normalized.warnings);
            match self.resolver.resolve_key(&normalized.record) {
                Ok(key) => out.records.push((key, normalized.record)),
                Err(unresolved) => {
                    warn!(
                        source = %unresolved.source_id,
                        vendor = unresolved.vendor.as_deref().unwrap_or("-"),
                        model = unresolved.model.as_deref().unwrap_or("-"),
                        reason = %unresolved.reason,
                        "Unresolved identity"
                    );
                    out.unresolved.push(unresolved);
                }
            }
        }
        Ok(out)
    }

    /// Runs every page through the pipeline and merges the results into
    /// the catalog.
    ///
    /// Pages of sources not selected by `options` are ignored without being
    /// counted. Once a page of a source fails structurally, the remaining
    /// pages of that source are skipped.
    ///
    /// # Errors
    /// [`RuntimeError`] only when the merge workers cannot be started; every
    /// other problem is reported in the [`RunReport`].
    pub fn run(
        &self,
        pages: impl IntoIterator<Item = PageModel>,
        options: &RunOptions,
    ) -> Result<RunReport, RuntimeError> {
        let mut report = RunReport::new(options.kind);
        for adapter in self.adapters.values().filter(|a| options.selects(a.as_ref())) {
            report.source_mut(&adapter.source_id());
        }
        info!(
            run_id = %report.run_id,
            kind = options.kind.map_or("all", ComponentKind::as_str),
            sources = report.sources.len(),
            "Pipeline run started"
        );

        let runtime = MergeRuntime::start(self.runtime, Arc::clone(&self.engine), Arc::clone(&self.catalog))?;

        'pages: for page in pages {
            if options.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let selected = self
                .adapters
                .get(&page.source_id)
                .map_or(options.kind.is_none() && options.sources.is_empty(), |a| {
                    options.selects(a.as_ref())
                });
            if !selected {
                continue;
            }

            let source = page.source_id.clone();
            let counts = report.source_mut(&source);
            if counts.failed() {
                counts.pages_skipped += 1;
                continue;
            }
            if options.since.is_some_and(|since| page.fetched_at < since) {
                counts.pages_outdated += 1;
                continue;
            }
            counts.pages += 1;

            let output = match self.process_page(&page) {
                Ok(output) => output,
                Err(err) => {
                    warn!(source = %source, locator = page.locator.as_deref().unwrap_or("-"), error = %err, "Source structure failure");
                    counts.structure_failures.push(err);
                    continue;
                }
            };

            counts.rows_skipped += output.rows_skipped;
            counts.records_dropped += output.records_dropped;
            counts.records_processed += output.records_processed;
            counts.field_warnings += output.field_warnings.len();
            counts.unresolved += output.unresolved.len();
            report.field_warnings.extend(output.field_warnings);
            report.unresolved.extend(output.unresolved);

            for (key, record) in output.records {
                if options.cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'pages;
                }
                if let Err(err) = runtime.submit(key.clone(), record) {
                    let counts = report.source_mut(&source);
                    counts.merge_failures += 1;
                    report.storage_errors.push(format!("{key}: {err}"));
                }
            }
            for done in runtime.drain_ready() {
                record_merge(&mut report, done);
            }
        }

        for done in runtime.finish() {
            record_merge(&mut report, done);
        }
        report.finished_at = Utc::now();
        report.log_summary();
        Ok(report)
    }
}

fn record_merge(report: &mut RunReport, done: MergeDone) {
    let MergeDone { source, key, result } = done;
    match result {
        Ok(outcome) => {
            let counts = report.source_mut(&source);
            match outcome.status {
                EntryStatus::Created => counts.entries_created += 1,
                EntryStatus::Updated => counts.entries_updated += 1,
                EntryStatus::Unchanged => counts.entries_unchanged += 1,
            }
            if !outcome.conflicts.is_empty() {
                counts.conflicted += 1;
            }
            report.conflicts.extend(outcome.conflicts);
        }
        Err(err) => {
            warn!(source = %source, key = %key, error = %err, "Merge failed");
            report.source_mut(&source).merge_failures += 1;
            report.storage_errors.push(format!("{key}: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::schema::CanonicalField;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn pipeline() -> (Pipeline, Arc<InMemoryCatalog>) {
        let catalog = Arc::new(InMemoryCatalog::new());
        let pipeline = Pipeline::new(&PipelineConfig::default(), catalog.clone()).unwrap();
        (pipeline, catalog)
    }

    fn dataset_page(fetched: i64) -> PageModel {
        PageModel::new(SourceId::cpu_dataset(), at(fetched)).with_pairs([
            ("Processor Number", "i5-750"),
            ("# of Cores", "4"),
            ("Processor Base Frequency", "2.66 GHz"),
        ])
    }

    #[test]
    fn process_page_keys_records() {
        let (pipeline, _) = pipeline();
        let out = pipeline.process_page(&dataset_page(0)).unwrap();
        assert_eq!(out.records_processed, 1);
        let (key, record) = &out.records[0];
        assert_eq!(key.to_string(), "intel/cpu/i-5-750");
        assert_eq!(record.get(CanonicalField::BaseClockMhz).and_then(|v| v.as_integer()), Some(2660));
    }

    #[test]
    fn unknown_source_is_a_structure_error() {
        let (pipeline, _) = pipeline();
        let page = PageModel::new(SourceId::new("nowhere"), at(0)).with_pairs([("a", "b")]);
        assert!(matches!(
            pipeline.process_page(&page),
            Err(SourceStructureError::NoAdapter { .. })
        ));
    }

    #[test]
    fn cancelled_run_merges_nothing_more() {
        let (pipeline, catalog) = pipeline();
        let token = CancellationToken::new();
        token.cancel();
        let report = pipeline
            .run([dataset_page(0)], &RunOptions::default().cancel_with(token))
            .unwrap();
        assert!(report.cancelled);
        assert!(catalog.is_empty().unwrap());
    }

    #[test]
    fn kind_filter_ignores_other_sources() {
        let (pipeline, catalog) = pipeline();
        let report = pipeline
            .run([dataset_page(0)], &RunOptions::default().kind(ComponentKind::Gpu))
            .unwrap();
        assert!(catalog.is_empty().unwrap());
        assert!(report.source(&SourceId::cpu_dataset()).is_none());
        assert!(report.source(&SourceId::gpu_encyclopedia()).is_some());
    }

    #[test]
    fn failed_source_skips_its_remaining_pages() {
        let (pipeline, catalog) = pipeline();
        let broken = PageModel::new(SourceId::cpu_dataset(), at(0)).with_pairs([("Title", "Dump")]);
        let report = pipeline
            .run([broken, dataset_page(5)], &RunOptions::default())
            .unwrap();
        let counts = report.source(&SourceId::cpu_dataset()).unwrap();
        assert_eq!(counts.structure_failures.len(), 1);
        assert_eq!(counts.pages, 1);
        assert_eq!(counts.pages_skipped, 1);
        assert_eq!(counts.pages_outdated, 0);
        assert_eq!(report.exit_code(), 1);
        assert!(catalog.is_empty().unwrap());
    }
}
