//! Benchmarks for hypervector operations.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use hyperbits::hv::{HyperVec, logic};
use hyperbits::random::{self, DEFAULT_DENSITY_DEPTH, DensityPlan, HvRng};
use hyperbits::simd::{self, IsaLevel};
use hyperbits::{BITS, metrics, permute, vote};

fn bench_logic(c: &mut Criterion) {
    let mut rng = HvRng::seeded(0);
    let a = random::random_uniform(&mut rng);
    let b = random::random_uniform(&mut rng);
    let mut out = HyperVec::ZERO;

    c.bench_function(&format!("xor_{BITS}"), |bench| {
        bench.iter(|| logic::xor_into(black_box(&a), black_box(&b), &mut out))
    });
    c.bench_function(&format!("and_{BITS}"), |bench| {
        bench.iter(|| logic::and_into(black_box(&a), black_box(&b), &mut out))
    });
    c.bench_function(&format!("invert_{BITS}"), |bench| {
        bench.iter(|| logic::invert_into(black_box(&a), &mut out))
    });
}

fn bench_popcount_tiers(c: &mut Criterion) {
    let mut rng = HvRng::seeded(0);
    let a = random::random_uniform(&mut rng);
    let b = random::random_uniform(&mut rng);

    let mut group = c.benchmark_group("hamming");
    for level in IsaLevel::ALL {
        let Some(kernel) = simd::kernel_for(level) else {
            continue;
        };
        group.bench_function(BenchmarkId::from_parameter(format!("{level:?}")), |bench| {
            bench.iter(|| black_box(kernel.hamming(a.words(), b.words())))
        });
    }
    group.finish();

    c.bench_function("active_dispatched", |bench| {
        bench.iter(|| black_box(metrics::active(black_box(&a))))
    });
}

fn bench_majority(c: &mut Criterion) {
    let mut rng = HvRng::seeded(0);
    let mut group = c.benchmark_group("majority");
    for n in [3usize, 9, 27, 255] {
        let inputs: Vec<_> = (0..n).map(|_| random::random_uniform(&mut rng)).collect();
        let mut out = HyperVec::ZERO;
        group.bench_with_input(BenchmarkId::from_parameter(n), &inputs, |bench, inputs| {
            bench.iter(|| vote::majority_into(black_box(inputs), &mut out))
        });
    }
    group.finish();
}

fn bench_random(c: &mut Criterion) {
    let mut rng = HvRng::seeded(0);
    let mut out = HyperVec::ZERO;

    c.bench_function("random_uniform", |bench| {
        bench.iter(|| random::random_uniform_into(&mut rng, &mut out))
    });
    c.bench_function("random_pow2_e4", |bench| {
        bench.iter(|| random::random_pow2_into(&mut rng, &mut out, 4))
    });

    let mut group = c.benchmark_group("random_density");
    for p in [0.01, 0.26, 0.5] {
        let plan = DensityPlan::new(p, DEFAULT_DENSITY_DEPTH);
        group.bench_with_input(BenchmarkId::from_parameter(p), &plan, |bench, plan| {
            bench.iter(|| random::random_plan_into(&mut rng, &mut out, plan))
        });
    }
    group.finish();
}

fn bench_permute(c: &mut Criterion) {
    let mut rng = HvRng::seeded(0);
    let a = random::random_uniform(&mut rng);
    let mut out = HyperVec::ZERO;

    c.bench_function("permute_unaligned", |bench| {
        bench.iter(|| permute::permute_into(black_box(&a), black_box(12_345), &mut out))
    });
    c.bench_function("permute_word_aligned", |bench| {
        bench.iter(|| permute::permute_into(black_box(&a), black_box(640), &mut out))
    });
}

criterion_group!(
    benches,
    bench_logic,
    bench_popcount_tiers,
    bench_majority,
    bench_random,
    bench_permute
);
criterion_main!(benches);
