use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wolfquorum::prelude::*;

fn config(version: u64, ids: impl IntoIterator<Item = ServerId>) -> Arc<QuorumConfig> {
    let members = ids
        .into_iter()
        .map(|id| Member::participant(id, format!("node-{}", id), 2888, 3888));
    Arc::new(QuorumConfig::majority(version, members).unwrap())
}

fn bench_contains_quorum(c: &mut Criterion) {
    let mut group = c.benchmark_group("contains_quorum");
    for size in [3u64, 5, 7, 51] {
        let cfg = config(1, 1..=size);
        let acks: AckSet = (1..=size / 2 + 1).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &acks, |b, acks| {
            b.iter(|| cfg.contains_quorum(black_box(acks)))
        });
    }
    group.finish();
}

fn bench_dual_round(c: &mut Criterion) {
    let old = config(1, 1..=5);
    let new = config(2, 2..=6);

    c.bench_function("dual_round", |b| {
        b.iter(|| {
            let mut tracker = AckTracker::with_config(old.clone());
            tracker.register(new.clone());
            for id in 1..=6 {
                tracker.record_ack(black_box(id));
                if tracker.has_all_quorums() {
                    break;
                }
            }
            tracker.has_all_quorums()
        })
    });
}

criterion_group!(benches, bench_contains_quorum, bench_dual_round);
criterion_main!(benches);
