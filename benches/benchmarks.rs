use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use bytes::Bytes;
use std::io::Cursor;
use tokio_mimedb::*;

// A globs2 table in the shape update-mime-database writes.
fn synthetic_globs2(count: usize) -> String {
    let mut out = String::from("# generated\n");
    for i in 0..count {
        out.push_str(&format!("50:application/x-bench{i}:*.ext{i}\n"));
        if i % 10 == 0 {
            out.push_str(&format!("40:application/x-bench{i}:*.long{i}.ext{i}\n"));
            out.push_str(&format!("60:application/x-bench{i}:BENCH{i}*\n"));
        }
    }
    out
}

fn seeded_database(count: usize) -> MimeDatabase {
    let db = MimeDatabase::with_builtin_types();
    for i in 0..count {
        let rule = MagicRule::at(format!("MAGIC{i:05}").into_bytes(), 0).unwrap();
        db.add_type(
            TypeRecord::new(format!("application/x-bench{i}"))
                .with_parent("application/octet-stream")
                .with_magic(MagicRuleGroup::new(50).unwrap().with_rule(rule)),
        );
    }
    db.add_globs2(Cursor::new(synthetic_globs2(count))).unwrap();
    db
}

// Benchmark filename lookups
fn bench_file_name_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_name_lookup");
    let db = seeded_database(500);

    let cases = [
        ("fast_pattern", "photo.jpg"),
        ("longest_literal", "src.tar.bz2"),
        ("high_weight", "BENCH250.txt"),
        ("low_weight", "a.long120.ext120"),
        ("no_match", "mystery"),
    ];

    for (name, file_name) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &file_name, |b, &file_name| {
            b.iter(|| db.mime_type_for_file_name(black_box(file_name)));
        });
    }

    group.finish();
}

// Benchmark content sniffing
fn bench_content_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_match");
    let db = seeded_database(500);
    // Warm the hierarchy so only the scan is measured.
    db.mime_type_for_data(b"");

    for size in [64usize, 4_096, MAX_DATA] {
        let mut data = vec![b'x'; size];
        data[..5].copy_from_slice(b"%PDF-");
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("pdf", size), &data, |b, data| {
            b.iter(|| db.mime_type_for_data(black_box(data)));
        });
    }

    let miss = vec![0u8; 1_024];
    group.bench_function("no_match", |b| {
        b.iter(|| db.match_by_content(black_box(&miss)));
    });

    group.finish();
}

// Benchmark the combined procedure
fn bench_combined(c: &mut Criterion) {
    let mut group = c.benchmark_group("combined");
    let db = seeded_database(500);

    group.bench_function("name_wins_tie", |b| {
        b.iter(|| {
            db.match_by_file_and_content(black_box("notes.txt"), true, || {
                Some(Bytes::from_static(b"MAGIC00042 trailing"))
            })
        });
    });

    group.bench_function("content_only", |b| {
        b.iter(|| {
            db.match_by_file_and_content(black_box("upload"), true, || {
                Some(Bytes::from_static(b"MAGIC00042 trailing"))
            })
        });
    });

    group.finish();
}

// Benchmark hierarchy recomputation after ingestion
fn bench_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy");

    for count in [100usize, 1_000] {
        let db = seeded_database(count);
        group.bench_with_input(BenchmarkId::new("recompute", count), &count, |b, _| {
            b.iter(|| {
                // Re-adding a record marks the levels dirty.
                db.add_type(
                    TypeRecord::new("application/x-bench0").with_parent("application/octet-stream"),
                );
                db.registry().max_level()
            });
        });
    }

    group.finish();
}

// Benchmark async file lookup
fn bench_file_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_lookup");
    let db = seeded_database(100);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.pdf");
    std::fs::write(&path, b"%PDF-1.4\n%bench").unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();

    for mode in [MatchMode::Default, MatchMode::Extension, MatchMode::Content] {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &mode, |b, &mode| {
            b.to_async(&rt).iter(|| db.mime_type_for_file(black_box(&path), mode));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_file_name_lookup,
    bench_content_match,
    bench_combined,
    bench_hierarchy,
    bench_file_lookup
);
criterion_main!(benches);
