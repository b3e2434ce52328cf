use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shroud_wallet_core::plan_inputs;

fn values(n: usize) -> Vec<u128> {
    let mut v: Vec<u128> = (0..n as u128).map(|i| (i * 7919) % 1_000 + 1).collect();
    v.sort_unstable();
    v
}

fn bench_plan_inputs(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_inputs");
    for n in [16usize, 64, 128] {
        let candidates = values(n);
        let target = candidates.iter().rev().take(3).sum::<u128>() - 1;
        group.bench_with_input(BenchmarkId::from_parameter(n), &candidates, |b, candidates| {
            b.iter(|| plan_inputs(black_box(candidates), black_box(target), 4))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan_inputs);
criterion_main!(benches);
