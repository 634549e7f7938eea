use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::{Duration, UNIX_EPOCH};
use sysvigil::query::{QuerySpec, SortColumn, query};
use sysvigil::system::process::{ProcessRecord, ProcessSnapshot, ProcessStatus, RawProcess, SnapshotBuilder};

fn make_records(n: usize) -> Vec<ProcessRecord> {
    (0..n)
        .map(|i| ProcessRecord {
            pid: i as u32 + 1,
            name: format!("proc_{i}"),
            owner_user: format!("u{}", i % 8),
            status: ProcessStatus::Running,
            cpu_percent: (i % 100) as f32,
            memory_percent: 0.0,
            memory_bytes: ((n - i) as u64 + 1) * 1024,
            command_line: format!("proc_{i} --work"),
        })
        .collect()
}

fn make_reads(n: usize, tick: u64) -> Vec<RawProcess> {
    (0..n)
        .map(|i| RawProcess {
            pid: i as u32 + 1,
            start_time: 1_000,
            name: Some(format!("proc_{i}")),
            owner_user: Some(format!("u{}", i % 8)),
            status: Some(ProcessStatus::Sleeping),
            cpu_time_ms: Some(tick * (i as u64 % 50)),
            memory_bytes: Some(((n - i) as u64 + 1) * 1024),
            command: vec![format!("proc_{i}"), "--work".to_string()],
        })
        .collect()
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_500_1000_2000");
    let spec = QuerySpec {
        name_filter: "proc_1".to_string(),
        include_system_processes: true,
        sort_column: SortColumn::Cpu,
        sort_ascending: false,
    };

    for size in [500usize, 1000, 2000] {
        let snapshot = ProcessSnapshot::from_records(UNIX_EPOCH, make_records(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| black_box(query(black_box(snapshot), black_box(&spec), "u0")))
        });
    }

    group.finish();
}

fn bench_name_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_name_sort_500_1000_2000");
    let spec = QuerySpec {
        include_system_processes: true,
        sort_column: SortColumn::Name,
        sort_ascending: true,
        ..QuerySpec::default()
    };

    for size in [500usize, 1000, 2000] {
        let snapshot = ProcessSnapshot::from_records(UNIX_EPOCH, make_records(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| black_box(query(black_box(snapshot), black_box(&spec), "u0")))
        });
    }

    group.finish();
}

fn bench_snapshot_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_build_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let first = make_reads(size, 1);
        let second = make_reads(size, 2);
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(first, second),
            |b, (first, second)| {
                b.iter(|| {
                    let mut builder = SnapshotBuilder::new();
                    builder.build(black_box(first.clone()), UNIX_EPOCH, 1 << 34);
                    let snapshot = builder.build(
                        black_box(second.clone()),
                        UNIX_EPOCH + Duration::from_secs(2),
                        1 << 34,
                    );
                    black_box(snapshot);
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_query, bench_name_sort, bench_snapshot_build);
criterion_main!(benches);
