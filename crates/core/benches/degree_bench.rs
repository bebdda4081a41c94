use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use markerprep_core::degree::{filter_by_degree, Role};
use markerprep_core::enrich::{retained_follower_counts, MarkerIndex};
use markerprep_core::markers::converge;
use markerprep_core::summary::EdgeSummary;
use markerprep_core::{Edge, MarkerRecord, Table};

/// Edges where follower `f` follows `f % 7 + 1` markers out of `markers`.
fn synthetic_edges(followers: i64, markers: i64) -> Table<Edge> {
    let mut rows = Vec::new();
    for f in 0..followers {
        for k in 0..(f % 7 + 1) {
            rows.push(Edge::new((f * 31 + k * 17) % markers, f));
        }
    }
    Table::new("edges", rows)
}

fn bench_degree_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("degree_filter");
    let edges = synthetic_edges(20_000, 500);
    group.throughput(Throughput::Elements(edges.len() as u64));

    group.bench_function("follower_min_2", |b| {
        b.iter(|| black_box(filter_by_degree(edges.clone(), Role::Follower, 2)));
    });

    group.bench_function("marker_min_20", |b| {
        b.iter(|| black_box(filter_by_degree(edges.clone(), Role::Marker, 20)));
    });

    group.finish();
}

fn bench_marker_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("marker_convergence");
    let edges = synthetic_edges(20_000, 2_000);
    let markers = MarkerIndex::new(Table::new(
        "markers",
        (0..2_000i64).map(MarkerRecord::new).collect(),
    ))
    .unwrap();
    group.throughput(Throughput::Elements(edges.len() as u64));

    group.bench_function("retained_counts", |b| {
        b.iter(|| black_box(retained_follower_counts(&edges)));
    });

    for passes in [1usize, 4] {
        group.bench_function(format!("{}_passes", passes), |b| {
            b.iter(|| black_box(converge(edges.clone(), &markers, 60, 2, passes)));
        });
    }

    group.bench_function("edge_summary", |b| {
        b.iter(|| black_box(EdgeSummary::compute(&edges)));
    });

    group.finish();
}

criterion_group!(benches, bench_degree_filter, bench_marker_convergence);
criterion_main!(benches);
