/// Pass throughput benchmarks
///
/// Measures rows per second through the aggregation and reshape stages,
/// reading CSV text and discarding the rendered output.
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rowpass::csv_output::{feed_csv, CsvWriter};
use rowpass::reshape::{StackAction, Stacker};
use rowpass::summarizer::{StatFlags, Summarizer};
use rowpass::variance_analyzer::VarianceAnalyzer;
use std::time::Duration;

/// `rows` data rows spread over `groups` keys
fn table(rows: usize, groups: usize) -> String {
    let mut csv = String::from("region,shard,latency,bytes,note\n");
    for i in 0..rows {
        let key = (i * 7919) % groups;
        csv.push_str(&format!(
            "r{},s{},{}.{},{},n{}\n",
            key,
            key % 4,
            i % 97,
            i % 10,
            (i * 31) % 4096,
            i
        ));
    }
    csv
}

fn summarizer() -> Summarizer {
    let mut summarizer =
        Summarizer::new().with_next(Box::new(CsvWriter::new(std::io::sink())));
    summarizer.add_group("^(region|shard)$").unwrap();
    summarizer
        .add_data("^(latency|bytes)$", StatFlags::COUNT | StatFlags::AVERAGE | StatFlags::STDDEV)
        .unwrap();
    summarizer.add_data("^latency$", StatFlags::MIN | StatFlags::MAX).unwrap();
    summarizer
}

/// Benchmark: Summarizer over a growing number of groups
fn bench_summarizer_groups(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarizer_groups");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(50_000));

    for groups in [10, 1_000, 50_000].iter() {
        let input = table(50_000, *groups);
        group.bench_with_input(BenchmarkId::from_parameter(groups), &input, |b, input| {
            b.iter_batched(
                summarizer,
                |mut stage| {
                    feed_csv(black_box(input.as_bytes()), &mut stage).unwrap();
                    stage
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmark: Variance analyzer on a few large groups
fn bench_variance_analyzer(c: &mut Criterion) {
    let mut group = c.benchmark_group("variance_analyzer");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(50_000));

    let input = table(50_000, 8);
    group.bench_function("anova_8_groups", |b| {
        b.iter_batched(
            || {
                let mut analyzer =
                    VarianceAnalyzer::new().with_next(Box::new(CsvWriter::new(std::io::sink())));
                analyzer.add_group("^region$").unwrap();
                analyzer.add_data("^(latency|bytes)$").unwrap();
                analyzer
            },
            |mut stage| {
                feed_csv(black_box(input.as_bytes()), &mut stage).unwrap();
                stage
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

/// Benchmark: Stacker, which emits one row per data cell
fn bench_stacker(c: &mut Criterion) {
    let mut group = c.benchmark_group("stacker");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(20_000));

    let input = table(20_000, 100);
    group.bench_function("stack_3_of_5", |b| {
        b.iter_batched(
            || {
                let mut stacker =
                    Stacker::new().with_next(Box::new(CsvWriter::new(std::io::sink())));
                stacker.add_keyword("region", StackAction::Leave).unwrap();
                stacker.add_keyword("note", StackAction::Remove).unwrap();
                stacker
            },
            |mut stage| {
                feed_csv(black_box(input.as_bytes()), &mut stage).unwrap();
                stage
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_summarizer_groups,
    bench_variance_analyzer,
    bench_stacker
);
criterion_main!(benches);
