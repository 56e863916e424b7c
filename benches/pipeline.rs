use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use hwcatalog::normalize::coerce;
use hwcatalog::normalize::{FieldRule, MultiValue};
use hwcatalog::{
    CanonicalField, IdentityResolver, InMemoryCatalog, PageModel, Pipeline, PipelineConfig, RunOptions, SourceId,
};

const ROWS: u64 = 512;

fn gpu_page() -> PageModel {
    let mut page = PageModel::new(SourceId::gpu_encyclopedia(), Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        .with_context("vendor", "NVIDIA");
    for i in 0..ROWS {
        page = page.with_pairs([
            ("Model", format!("GeForce RTX {}", 2000 + i)),
            ("Clock rate Core (MHz)", format!("{}", 1400 + i % 400)),
            ("Clock rate Boost (MHz)", "2.52 GHz".to_string()),
            ("Memory Size (GiB)", "8\n16".to_string()),
            ("Memory Bus width (bit)", "256".to_string()),
            ("TDP (Watts)", "320[12]".to_string()),
        ]);
    }
    page
}

fn bench_coerce(c: &mut Criterion) {
    let rule = FieldRule {
        field: CanonicalField::MemoryClockMhz,
        default_unit: None,
        multi: MultiValue::Max,
    };
    c.bench_function("normalize/coerce_multi_value", |b| {
        b.iter(|| coerce(std::hint::black_box("2133/2400/2933 MHz"), &rule));
    });
}

fn bench_identity(c: &mut Criterion) {
    let resolver = IdentityResolver::default();
    c.bench_function("identity/normalize_brand_string", |b| {
        b.iter(|| resolver.normalize_model("intel", std::hint::black_box("Intel(R) Core(TM) i9-9900K CPU @ 3.60GHz")));
    });
}

fn bench_pipeline_run(c: &mut Criterion) {
    let page = gpu_page();
    let mut group = c.benchmark_group("pipeline_run");
    group.throughput(Throughput::Elements(ROWS));

    group.bench_function("fresh_catalog", |b| {
        b.iter_batched(
            || {
                let catalog = Arc::new(InMemoryCatalog::new());
                let pipeline = Pipeline::new(&PipelineConfig::default(), catalog).unwrap();
                (pipeline, page.clone())
            },
            |(pipeline, page)| pipeline.run([page], &RunOptions::default()).unwrap(),
            BatchSize::SmallInput,
        );
    });

    // Every merge is a no-op on the second pass.
    group.bench_function("idempotent_rerun", |b| {
        let catalog = Arc::new(InMemoryCatalog::new());
        let pipeline = Pipeline::new(&PipelineConfig::default(), catalog).unwrap();
        pipeline.run([page.clone()], &RunOptions::default()).unwrap();
        b.iter_batched(
            || page.clone(),
            |page| pipeline.run([page], &RunOptions::default()).unwrap(),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_coerce, bench_identity, bench_pipeline_run);
criterion_main!(benches);
