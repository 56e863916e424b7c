//! End-to-end pipeline tests: pages in, catalog entries out.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use hwcatalog::merge::{EntryStatus, MergeEngine};
use hwcatalog::{
    CanonicalField, CanonicalRecord, Catalog, CatalogKey, ComponentKind, ConfidenceTier, FieldValue, InMemoryCatalog, PageModel,
    Pipeline, PipelineConfig, RunOptions, SourceId, SourceStructureError,
};

const MIRROR: &str = "vendor-gpu-specs";

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
}

fn config() -> PipelineConfig {
    PipelineConfig {
        gpu_table_mirrors: vec![SourceId::new(MIRROR)],
        ..PipelineConfig::default()
    }
}

fn setup() -> (Pipeline, Arc<InMemoryCatalog>) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let pipeline = Pipeline::new(&config(), catalog.clone()).unwrap();
    (pipeline, catalog)
}

fn key(s: &str) -> CatalogKey {
    s.parse().unwrap()
}

fn encyclopedia_4090(fetched: i64) -> PageModel {
    PageModel::new(SourceId::gpu_encyclopedia(), t(fetched))
        .with_context("vendor", "NVIDIA")
        .with_pairs([
            ("Model", "GeForce RTX 4090"),
            ("Clock rate Boost (MHz)", "2.52 GHz"),
            ("Memory Size (GiB)", "24 GB"),
        ])
}

fn mirror_4090(fetched: i64) -> PageModel {
    PageModel::new(SourceId::new(MIRROR), t(fetched))
        .with_context("vendor", "NVIDIA")
        .with_pairs([
            ("Model", "GeForce RTX 4090"),
            ("Boost clock", "2520 MHz"),
            ("Memory size (MB)", "24576 MB"),
        ])
}

fn listing_9900k(fetched: i64, base_clock: &str) -> PageModel {
    PageModel::new(SourceId::cpu_vendor_listing(), t(fetched)).with_pairs([
        ("ProductType", "Processors"),
        ("ProcessorNumber", "i9-9900K"),
        ("ProductId", "186605"),
        ("CoreCount", "8"),
        ("ThreadCount", "16"),
        ("ClockSpeed", base_clock),
    ])
}

fn dataset_9900k(fetched: i64, base_clock: &str) -> PageModel {
    PageModel::new(SourceId::cpu_dataset(), t(fetched)).with_pairs([
        ("id", "186605"),
        ("Essentials/Processor Number", "i9-9900K"),
        ("Performance/# of Cores", "8"),
        ("Performance/Processor Base Frequency", base_clock),
        ("Performance/Cache", "16 MB"),
        ("Essentials/Launch Date", "Q4'18"),
    ])
}

#[test]
fn rtx_4090_from_two_sources_converges_on_one_entry() {
    for mirror_first in [false, true] {
        let (pipeline, catalog) = setup();
        let pages = if mirror_first {
            vec![mirror_4090(10), encyclopedia_4090(0)]
        } else {
            vec![encyclopedia_4090(0), mirror_4090(10)]
        };
        let report = pipeline.run(pages, &RunOptions::default()).unwrap();
        assert_eq!(report.exit_code(), 0);
        assert!(report.conflicts.is_empty());

        assert_eq!(catalog.len().unwrap(), 1);
        let entry = catalog.get(&key("nvidia/gpu/rtx-4090")).unwrap().unwrap();
        assert_eq!(entry.integer(CanonicalField::BoostClockMhz), Some(2520));
        assert_eq!(entry.integer(CanonicalField::VramMb), Some(24_576));

        for field in [CanonicalField::BoostClockMhz, CanonicalField::VramMb] {
            let provenance = &entry.field(field).unwrap().provenance;
            assert_eq!(provenance.source, SourceId::gpu_encyclopedia());
            assert!(provenance.corroborations.contains_key(&SourceId::new(MIRROR)));
        }
    }
}

#[test]
fn rerunning_the_same_pages_changes_nothing() {
    let (pipeline, catalog) = setup();
    let pages = || {
        vec![
            dataset_9900k(0, "3.50 GHz"),
            listing_9900k(5, "3.60 GHz"),
            encyclopedia_4090(0),
            mirror_4090(10),
        ]
    };

    pipeline.run(pages(), &RunOptions::default()).unwrap();
    let first = catalog.entries().unwrap();

    let report = pipeline.run(pages(), &RunOptions::default()).unwrap();
    assert_eq!(catalog.entries().unwrap(), first);
    let totals = report.totals();
    assert_eq!(totals.entries_created, 0);
    assert_eq!(totals.entries_updated, 0);
    assert_eq!(totals.entries_unchanged, 4);
    assert!(report.conflicts.is_empty());
}

#[test]
fn vendor_listing_wins_clock_conflicts_in_either_order() {
    for listing_first in [false, true] {
        let (pipeline, catalog) = setup();
        let listing = listing_9900k(0, "3.60 GHz");
        let dataset = dataset_9900k(100, "3.50 GHz");
        let pages = if listing_first { vec![listing, dataset] } else { vec![dataset, listing] };

        let report = pipeline.run(pages, &RunOptions::default()).unwrap();
        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.field, CanonicalField::BaseClockMhz);
        assert_eq!(conflict.winner.source, SourceId::cpu_vendor_listing());
        assert_eq!(conflict.loser.value, FieldValue::Integer(3500));

        let entry = catalog.get(&key("intel/cpu/i-9-9900-k")).unwrap().unwrap();
        let clock = entry.field(CanonicalField::BaseClockMhz).unwrap();
        assert_eq!(clock.value, FieldValue::Integer(3600));
        assert_eq!(clock.provenance.superseded.len(), 1);
        assert_eq!(clock.provenance.superseded[0].source, SourceId::cpu_dataset());

        let conflicted = report.source(&SourceId::cpu_vendor_listing()).unwrap().conflicted
            + report.source(&SourceId::cpu_dataset()).unwrap().conflicted;
        assert_eq!(conflicted, 1);
    }
}

#[test]
fn fields_from_each_source_fill_the_entry() {
    let (pipeline, catalog) = setup();
    pipeline
        .run([listing_9900k(0, "3.60 GHz"), dataset_9900k(0, "3.6 GHz")], &RunOptions::default())
        .unwrap();

    let entry = catalog.get(&key("intel/cpu/i-9-9900-k")).unwrap().unwrap();
    assert_eq!(entry.integer(CanonicalField::ThreadCount), Some(16));
    assert_eq!(entry.integer(CanonicalField::CacheKb), Some(16 * 1024));
    assert_eq!(entry.integer(CanonicalField::ProductId), Some(186_605));
    assert_eq!(entry.text(CanonicalField::Launch), Some("Q4'18"));
    assert_eq!(
        entry.field(CanonicalField::CacheKb).unwrap().provenance.source,
        SourceId::cpu_dataset()
    );
}

#[test]
fn absent_fields_never_overwrite_present_ones() {
    let engine = MergeEngine::default();
    let catalog = InMemoryCatalog::new();
    let key = key("intel/cpu/i-9-9900-k");
    let full = CanonicalRecord::empty(ComponentKind::Cpu, SourceId::cpu_dataset(), t(0), ConfidenceTier::Community)
        .with(CanonicalField::Vendor, "Intel")
        .with(CanonicalField::Model, "i9-9900K")
        .with(CanonicalField::CoreCount, 8_i64);
    let sparse = CanonicalRecord::empty(ComponentKind::Cpu, SourceId::cpu_vendor_listing(), t(10), ConfidenceTier::Authoritative)
        .with(CanonicalField::Vendor, "Intel")
        .with(CanonicalField::Model, "i9-9900K");

    engine.merge(&key, &full, &catalog).unwrap();
    let outcome = engine.merge(&key, &sparse, &catalog).unwrap();
    assert!(outcome.conflicts.is_empty());

    let entry = catalog.get(&key).unwrap().unwrap();
    assert_eq!(entry.integer(CanonicalField::CoreCount), Some(8));
    assert_eq!(entry.field(CanonicalField::CoreCount).unwrap().provenance.source, SourceId::cpu_dataset());
}

#[test]
fn one_malformed_row_among_a_hundred_is_skipped() {
    let (pipeline, catalog) = setup();
    let mut page = PageModel::new(SourceId::gpu_encyclopedia(), t(0)).with_context("vendor", "NVIDIA");
    for i in 0..50 {
        page = page.with_pairs([
            ("Model", format!("GeForce RTX {}", 1000 + i)),
            ("Clock rate Core (MHz)", "1500".to_string()),
        ]);
    }
    page = page.with_pairs([
        ("Model", "Notes: values for reference boards only".to_string()),
        ("Clock rate Core (MHz)", String::new()),
    ]);
    for i in 50..100 {
        page = page.with_pairs([
            ("Model", format!("GeForce RTX {}", 1000 + i)),
            ("Clock rate Core (MHz)", "1500".to_string()),
        ]);
    }

    let report = pipeline.run([page], &RunOptions::default()).unwrap();
    let counts = report.source(&SourceId::gpu_encyclopedia()).unwrap();
    assert_eq!(counts.records_processed, 100);
    assert_eq!(counts.rows_skipped, 1);
    assert_eq!(counts.entries_created, 100);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(catalog.len().unwrap(), 100);
}

#[test]
fn a_broken_source_does_not_affect_the_others() {
    let (pipeline, catalog) = setup();
    let broken = PageModel::new(SourceId::cpu_vendor_listing(), t(0))
        .with_pairs([("Title", "We have redesigned our site!")]);

    let report = pipeline
        .run([broken, dataset_9900k(0, "3.60 GHz"), encyclopedia_4090(0)], &RunOptions::default())
        .unwrap();

    assert_eq!(report.exit_code(), 1);
    let listing = report.source(&SourceId::cpu_vendor_listing()).unwrap();
    assert!(matches!(
        listing.structure_failures.as_slice(),
        [SourceStructureError::MissingColumn { .. }]
    ));
    assert_eq!(report.source(&SourceId::cpu_dataset()).unwrap().entries_created, 1);
    assert_eq!(report.source(&SourceId::gpu_encyclopedia()).unwrap().entries_created, 1);
    assert_eq!(catalog.len().unwrap(), 2);
}

#[test]
fn bad_values_and_bad_identities_are_warnings() {
    let (pipeline, catalog) = setup();
    let page = PageModel::new(SourceId::gpu_encyclopedia(), t(0))
        .with_context("vendor", "NVIDIA")
        .with_pairs([("Model", "GeForce RTX 4080"), ("Clock rate Core (MHz)", "fast")])
        .with_pairs([("Model", "GeForce GTX 1070 / 1080"), ("Clock rate Core (MHz)", "1506")]);

    let report = pipeline.run([page], &RunOptions::default()).unwrap();
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.field_warnings.len(), 1);
    assert_eq!(report.field_warnings[0].field, CanonicalField::CoreClockMhz);
    assert_eq!(report.unresolved.len(), 1);

    let entry = catalog.get(&key("nvidia/gpu/rtx-4080")).unwrap().unwrap();
    assert!(entry.get(CanonicalField::CoreClockMhz).is_none());
    assert_eq!(catalog.len().unwrap(), 1);
}

#[test]
fn spellings_across_sources_and_runs_share_one_key() {
    let (pipeline, catalog) = setup();
    let branded = PageModel::new(SourceId::cpu_dataset(), t(0))
        .with_context("vendor", "GenuineIntel")
        .with_pairs([("Processor Number", "Intel(R) Core(TM) i9-9900K CPU @ 3.60GHz")]);

    pipeline.run([listing_9900k(0, "3.60 GHz")], &RunOptions::default()).unwrap();
    pipeline.run([branded], &RunOptions::default()).unwrap();

    assert_eq!(catalog.keys().unwrap(), vec![key("intel/cpu/i-9-9900-k")]);
}

#[test]
fn pages_older_than_since_are_skipped() {
    let (pipeline, catalog) = setup();
    let options = RunOptions::default().since(t(50));
    let report = pipeline
        .run([dataset_9900k(0, "3.60 GHz"), encyclopedia_4090(100)], &options)
        .unwrap();

    let dataset = report.source(&SourceId::cpu_dataset()).unwrap();
    assert_eq!(dataset.pages_outdated, 1);
    assert_eq!(dataset.pages_skipped, 0);
    assert_eq!(dataset.pages, 0);
    assert_eq!(catalog.keys().unwrap(), vec![key("nvidia/gpu/rtx-4090")]);
}

#[test]
fn newer_observation_from_the_same_source_updates_the_entry() {
    let (pipeline, catalog) = setup();
    pipeline.run([listing_9900k(0, "3.60 GHz")], &RunOptions::default()).unwrap();
    let report = pipeline.run([listing_9900k(100, "3.70 GHz")], &RunOptions::default()).unwrap();

    assert_eq!(report.source(&SourceId::cpu_vendor_listing()).unwrap().entries_updated, 1);
    let entry = catalog.get(&key("intel/cpu/i-9-9900-k")).unwrap().unwrap();
    assert_eq!(entry.integer(CanonicalField::BaseClockMhz), Some(3700));
    assert_eq!(entry.revision, 2);
    assert_eq!(entry.last_seen, t(100));

    let stale = pipeline.run([listing_9900k(50, "3.50 GHz")], &RunOptions::default()).unwrap();
    assert_eq!(stale.source(&SourceId::cpu_vendor_listing()).unwrap().entries_updated, 1);
    let entry = catalog.get(&key("intel/cpu/i-9-9900-k")).unwrap().unwrap();
    assert_eq!(entry.integer(CanonicalField::BaseClockMhz), Some(3700));
}

#[test]
fn merge_outcomes_report_creation_then_no_change() {
    let engine = MergeEngine::default();
    let catalog = InMemoryCatalog::new();
    let record = CanonicalRecord::empty(ComponentKind::Gpu, SourceId::gpu_encyclopedia(), t(0), ConfidenceTier::Community)
        .with(CanonicalField::Vendor, "AMD")
        .with(CanonicalField::Model, "Radeon RX 7900 XTX");
    let key = key("amd/gpu/rx-7900-xtx");

    assert_eq!(engine.merge(&key, &record, &catalog).unwrap().status, EntryStatus::Created);
    assert_eq!(engine.merge(&key, &record, &catalog).unwrap().status, EntryStatus::Unchanged);
}

#[test]
fn merged_entries_can_be_looked_up_and_scored() {
    let (pipeline, catalog) = setup();
    pipeline
        .run(
            [listing_9900k(0, "3.60 GHz"), encyclopedia_4090(0)],
            &RunOptions::default(),
        )
        .unwrap();

    let cpu = hwcatalog::lookup::find_by_model(
        catalog.as_ref(),
        ComponentKind::Cpu,
        "Intel(R) Core(TM) i9-9900K CPU @ 3.60GHz",
    )
    .unwrap()
    .unwrap();
    assert_eq!(cpu.key, key("intel/cpu/i-9-9900-k"));
    let expected = hwcatalog::score::cpu_score(8.0, 3600.0);
    assert!((hwcatalog::score::score(&cpu).unwrap() - expected).abs() < 1e-9);

    let gpu = catalog.get(&key("nvidia/gpu/rtx-4090")).unwrap().unwrap();
    // No core clock column on the page.
    assert_eq!(hwcatalog::score::score(&gpu), None);
}
