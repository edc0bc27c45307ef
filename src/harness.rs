//! Measurement harness.
//!
//! Times each primitive under two buffer regimes: *resident*, where every
//! call writes the same output buffer (stays in cache), and *fresh*, where
//! every call writes its own buffer (the output is cold). Each measurement
//! carries a correctness check: fast paths are compared against their
//! references, generators against their target density, and permutations
//! against an exact round trip.

use std::hint::black_box;
use std::str::FromStr;
use std::time::Instant;

use rand::seq::SliceRandom;

use crate::config::BenchConfig;
use crate::error::HarnessError;
use crate::hv::{BITS, HyperVec, WORDS, logic};
use crate::metrics;
use crate::permute::permute_into;
use crate::random::{self, HvRng};
use crate::simd::{BitKernel, reference};
use crate::vote;

/// A primitive the harness can time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchOp {
    And,
    Or,
    Xor,
    Invert,
    SwapHalves,
    Rehash,
    Active,
    Hamming,
    Majority,
    Rand,
    Rand2,
    Random,
    Permute,
}

impl BenchOp {
    /// Every benchmark, in run order.
    pub const ALL: [BenchOp; 13] = [
        BenchOp::And,
        BenchOp::Or,
        BenchOp::Xor,
        BenchOp::Invert,
        BenchOp::SwapHalves,
        BenchOp::Rehash,
        BenchOp::Active,
        BenchOp::Hamming,
        BenchOp::Majority,
        BenchOp::Rand,
        BenchOp::Rand2,
        BenchOp::Random,
        BenchOp::Permute,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BenchOp::And => "and",
            BenchOp::Or => "or",
            BenchOp::Xor => "xor",
            BenchOp::Invert => "invert",
            BenchOp::SwapHalves => "swap-halves",
            BenchOp::Rehash => "rehash",
            BenchOp::Active => "active",
            BenchOp::Hamming => "hamming",
            BenchOp::Majority => "majority",
            BenchOp::Rand => "rand",
            BenchOp::Rand2 => "rand2",
            BenchOp::Random => "random",
            BenchOp::Permute => "permute",
        }
    }
}

impl std::fmt::Display for BenchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BenchOp {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BenchOp::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| HarnessError::UnknownOp { name: s.into() })
    }
}

/// How a measurement's result was validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// Output agreed (or not) with the reference implementation.
    Equivalent(bool),
    /// Observed density over `bits` generated bits versus the target.
    Density { target: f64, observed: f64, bits: u64 },
}

impl Check {
    /// Whether the check passed. Densities pass within five standard deviations.
    pub fn passed(&self) -> bool {
        match *self {
            Check::Equivalent(ok) => ok,
            Check::Density {
                target,
                observed,
                bits,
            } => {
                let sigma = (target * (1.0 - target) / bits as f64).sqrt();
                (observed - target).abs() <= 5.0 * sigma + f64::EPSILON
            }
        }
    }
}

impl std::fmt::Display for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = if self.passed() { "v" } else { "x" };
        match self {
            Check::Equivalent(_) => write!(f, "equiv {mark}"),
            Check::Density {
                target, observed, ..
            } => write!(f, "density {observed:.6} (target {target:.6}) {mark}"),
        }
    }
}

/// One timed result.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub op: BenchOp,
    /// Parameter of this run, e.g. `n=27` or `p=0.01`.
    pub label: String,
    /// Timed calls.
    pub calls: usize,
    /// Mean wall-clock time per call.
    pub mean_ns: f64,
    pub check: Check,
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<12} {:<12} {:>10.3}µs  {}",
            self.op.name(),
            self.label,
            self.mean_ns / 1000.0,
            self.check
        )
    }
}

/// Output buffers: one shared buffer when resident, one per call otherwise.
struct Outputs {
    bufs: Vec<HyperVec>,
}

impl Outputs {
    fn new(resident: bool, calls: usize) -> Self {
        let count = if resident { 1 } else { calls.max(1) };
        Self {
            bufs: vec![HyperVec::ZERO; count],
        }
    }

    fn get(&mut self, call: usize) -> &mut HyperVec {
        let len = self.bufs.len();
        &mut self.bufs[call % len]
    }

    /// The buffer still holding the result of `call`, if it was not overwritten.
    fn result_of(&self, call: usize, calls: usize) -> Option<&HyperVec> {
        match self.bufs.len() {
            1 if call + 1 == calls => self.bufs.first(),
            1 => None,
            _ => self.bufs.get(call),
        }
    }
}

/// Cheap digest of a result so timed work cannot be optimised away.
fn digest(v: &HyperVec) -> u64 {
    let w = v.words();
    w[0].wrapping_add(w[4].wrapping_mul(3))
        .wrapping_add(w[WORDS / 2].wrapping_mul(5))
        .wrapping_add(w[WORDS - 1].wrapping_mul(7))
}

fn mean_ns(start: Instant, calls: usize) -> f64 {
    start.elapsed().as_nanos() as f64 / calls.max(1) as f64
}

/// Drives the benchmarks against one kernel tier.
pub struct Harness {
    config: BenchConfig,
    rng: HvRng,
    kernel: Box<dyn BitKernel>,
}

impl Harness {
    pub fn new(config: BenchConfig, kernel: Box<dyn BitKernel>) -> Self {
        let rng = match config.seed {
            Some(seed) => HvRng::seeded(seed),
            None => HvRng::from_entropy(),
        };
        Self {
            config,
            rng,
            kernel,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Run each op in `ops`, returning every measurement in order.
    pub fn run_all(&mut self, ops: &[BenchOp]) -> Vec<Measurement> {
        tracing::info!(
            isa = %self.kernel.isa_level(),
            bits = BITS,
            resident = self.config.resident,
            iterations = self.config.iterations,
            "starting harness run"
        );
        let mut results = Vec::new();
        for &op in ops {
            if self.config.warmup {
                self.run(op);
            }
            for m in self.run(op) {
                if !m.check.passed() {
                    tracing::warn!(op = %m.op, label = %m.label, check = %m.check, "check failed");
                }
                results.push(m);
            }
        }
        results
    }

    /// Run one op.
    pub fn run(&mut self, op: BenchOp) -> Vec<Measurement> {
        match op {
            BenchOp::And => vec![self.binary(op, |a, b| a & b)],
            BenchOp::Or => vec![self.binary(op, |a, b| a | b)],
            BenchOp::Xor => vec![self.binary(op, |a, b| a ^ b)],
            BenchOp::Invert | BenchOp::SwapHalves | BenchOp::Rehash => vec![self.unary(op)],
            BenchOp::Active => vec![self.active()],
            BenchOp::Hamming => vec![self.hamming()],
            BenchOp::Majority => self.majority(),
            BenchOp::Rand => vec![self.rand()],
            BenchOp::Rand2 => self.rand2(),
            BenchOp::Random => self.random(),
            BenchOp::Permute => vec![self.permute()],
        }
    }

    /// One input per call, with densities spread evenly over `[0, 1)`.
    fn density_sweep(&mut self, count: usize) -> Vec<HyperVec> {
        (0..count)
            .map(|i| *random::random_density(&mut self.rng, i as f64 / count as f64))
            .collect()
    }

    fn binary(&mut self, op: BenchOp, scalar: fn(u64, u64) -> u64) -> Measurement {
        let calls = self.config.iterations;
        let lhs = self.density_sweep(calls);
        let mut order: Vec<usize> = (0..calls).collect();
        order.shuffle(&mut self.rng);
        let mut out = Outputs::new(self.config.resident, calls);

        let kernel = self.kernel.as_ref();
        let apply = |a: &HyperVec, b: &HyperVec, m: &mut HyperVec| match op {
            BenchOp::And => kernel.and(a.words(), b.words(), m.words_mut()),
            BenchOp::Or => kernel.or(a.words(), b.words(), m.words_mut()),
            _ => kernel.xor(a.words(), b.words(), m.words_mut()),
        };

        let mut sink = 0u64;
        let start = Instant::now();
        for i in 0..calls {
            let m = out.get(i);
            apply(&lhs[i], &lhs[order[i]], m);
            sink ^= digest(black_box(m));
        }
        let mean = mean_ns(start, calls);
        black_box(sink);

        let mut ok = true;
        let mut expected = HyperVec::ZERO;
        let mut actual = HyperVec::ZERO;
        for i in 0..calls {
            let (a, b) = (&lhs[i], &lhs[order[i]]);
            for ((e, &x), &y) in expected.words_mut().iter_mut().zip(a.words()).zip(b.words()) {
                *e = scalar(x, y);
            }
            apply(a, b, &mut actual);
            ok &= actual == expected;
            if let Some(stored) = out.result_of(i, calls) {
                ok &= *stored == expected;
            }
        }

        Measurement {
            op,
            label: String::new(),
            calls,
            mean_ns: mean,
            check: Check::Equivalent(ok),
        }
    }

    fn unary(&mut self, op: BenchOp) -> Measurement {
        let calls = self.config.iterations;
        let inputs = self.density_sweep(calls);
        let mut out = Outputs::new(self.config.resident, calls);
        let kernel = self.kernel.as_ref();
        let apply = |a: &HyperVec, m: &mut HyperVec| match op {
            BenchOp::Invert => kernel.invert(a.words(), m.words_mut()),
            BenchOp::SwapHalves => logic::swap_halves_into(a, m),
            _ => random::rehash_into(a, m),
        };

        let mut sink = 0u64;
        let start = Instant::now();
        for (i, a) in inputs.iter().enumerate() {
            let m = out.get(i);
            apply(a, m);
            sink ^= digest(black_box(m));
        }
        let mean = mean_ns(start, calls);
        black_box(sink);

        // Rehash has no closed form; it must at least be repeatable.
        let mut ok = true;
        let mut expected = HyperVec::ZERO;
        let mut actual = HyperVec::ZERO;
        for (i, a) in inputs.iter().enumerate() {
            match op {
                BenchOp::Invert => {
                    for (e, &w) in expected.words_mut().iter_mut().zip(a.words()) {
                        *e = !w;
                    }
                }
                BenchOp::SwapHalves => {
                    for bit in 0..BITS {
                        expected.set_bit(bit, a.get_bit((bit + BITS / 2) % BITS));
                    }
                }
                _ => random::rehash_into(a, &mut expected),
            }
            apply(a, &mut actual);
            ok &= actual == expected;
            if let Some(stored) = out.result_of(i, calls) {
                ok &= *stored == expected;
            }
        }

        Measurement {
            op,
            label: String::new(),
            calls,
            mean_ns: mean,
            check: Check::Equivalent(ok),
        }
    }

    fn active(&mut self) -> Measurement {
        let calls = self.config.iterations;
        let inputs = self.density_sweep(calls);
        let kernel = self.kernel.as_ref();

        let start = Instant::now();
        let observed: Vec<u32> = inputs
            .iter()
            .map(|v| black_box(kernel.active(v.words())))
            .collect();
        let mean = mean_ns(start, calls);

        let ok = inputs
            .iter()
            .zip(&observed)
            .all(|(v, &count)| count == reference::active(v.words()));
        Measurement {
            op: BenchOp::Active,
            label: self.kernel.isa_level().to_string(),
            calls,
            mean_ns: mean,
            check: Check::Equivalent(ok),
        }
    }

    fn hamming(&mut self) -> Measurement {
        let calls = (self.config.iterations / 2).max(1);
        let lhs = self.density_sweep(calls);
        let mut rhs = self.density_sweep(calls);
        rhs.reverse();
        let kernel = self.kernel.as_ref();

        let start = Instant::now();
        let observed: Vec<u32> = lhs
            .iter()
            .zip(&rhs)
            .map(|(a, b)| black_box(kernel.hamming(a.words(), b.words())))
            .collect();
        let mean = mean_ns(start, calls);

        let ok = lhs
            .iter()
            .zip(&rhs)
            .zip(&observed)
            .all(|((a, b), &d)| d == reference::hamming(a.words(), b.words()));
        Measurement {
            op: BenchOp::Hamming,
            label: self.kernel.isa_level().to_string(),
            calls,
            mean_ns: mean,
            check: Check::Equivalent(ok),
        }
    }

    fn majority(&mut self) -> Vec<Measurement> {
        // Fewer calls for larger n keeps the total input volume constant.
        const VOLUME_PER_ITERATION: usize = 10;
        const VERIFIED_SETS: usize = 4;

        let sizes = self.config.majority_sizes.clone();
        let mut results = Vec::with_capacity(sizes.len());
        for n in sizes {
            let calls = (self.config.iterations * VOLUME_PER_ITERATION / n).max(1);
            let set_count = if self.config.resident { 1 } else { calls };
            let sets: Vec<Vec<HyperVec>> = (0..set_count)
                .map(|_| {
                    (0..n)
                        .map(|_| *random::random_uniform(&mut self.rng))
                        .collect()
                })
                .collect();
            let mut out = Outputs::new(self.config.resident, calls);

            let mut sink = 0u64;
            let start = Instant::now();
            for i in 0..calls {
                let m = out.get(i);
                vote::majority_into(&sets[i % set_count], m);
                sink ^= digest(black_box(m));
            }
            let mean = mean_ns(start, calls);
            black_box(sink);

            let mut ok = true;
            let mut expected = HyperVec::ZERO;
            for i in 0..calls.min(VERIFIED_SETS) {
                vote::threshold_into_reference(&sets[i % set_count], n / 2, &mut expected);
                let mut actual = HyperVec::ZERO;
                vote::majority_into(&sets[i % set_count], &mut actual);
                ok &= actual == expected;
            }

            tracing::debug!(n, calls, ns_per_vector = mean / n as f64, "majority measured");
            results.push(Measurement {
                op: BenchOp::Majority,
                label: format!("n={n}"),
                calls,
                mean_ns: mean,
                check: Check::Equivalent(ok),
            });
        }
        results
    }

    fn rand(&mut self) -> Measurement {
        let calls = self.config.iterations;
        let mut out = Outputs::new(self.config.resident, calls);
        let mut bits_set = 0u64;

        let start = Instant::now();
        for i in 0..calls {
            let m = out.get(i);
            random::random_uniform_into(&mut self.rng, m);
            bits_set += u64::from(metrics::active(black_box(m)));
        }
        let mean = mean_ns(start, calls);

        let bits = (calls * BITS) as u64;
        Measurement {
            op: BenchOp::Rand,
            label: String::new(),
            calls,
            mean_ns: mean,
            check: Check::Density {
                target: 0.5,
                observed: bits_set as f64 / bits as f64,
                bits,
            },
        }
    }

    fn rand2(&mut self) -> Vec<Measurement> {
        let calls = self.config.iterations;
        let exponents = self.config.pow2_exponents.clone();
        let mut results = Vec::with_capacity(exponents.len());
        for e in exponents {
            let mut out = Outputs::new(self.config.resident, calls);
            let mut bits_set = 0u64;

            let start = Instant::now();
            for i in 0..calls {
                let m = out.get(i);
                random::random_pow2_into(&mut self.rng, m, e);
                bits_set += u64::from(metrics::active(black_box(m)));
            }
            let mean = mean_ns(start, calls);

            let bits = (calls * BITS) as u64;
            results.push(Measurement {
                op: BenchOp::Rand2,
                label: format!("e={e}"),
                calls,
                mean_ns: mean,
                check: Check::Density {
                    target: 0.5f64.powi(e as i32),
                    observed: bits_set as f64 / bits as f64,
                    bits,
                },
            });
        }
        results
    }

    fn random(&mut self) -> Vec<Measurement> {
        let calls = self.config.iterations;
        let densities = self.config.densities.clone();
        let mut results = Vec::with_capacity(densities.len());
        for p in densities {
            let mut out = Outputs::new(self.config.resident, calls);
            let mut bits_set = 0u64;

            let start = Instant::now();
            for i in 0..calls {
                let m = out.get(i);
                random::random_density_into(&mut self.rng, m, p);
                bits_set += u64::from(metrics::active(black_box(m)));
            }
            let mean = mean_ns(start, calls);

            let bits = (calls * BITS) as u64;
            results.push(Measurement {
                op: BenchOp::Random,
                label: format!("p={p}"),
                calls,
                mean_ns: mean,
                check: Check::Density {
                    target: p,
                    observed: bits_set as f64 / bits as f64,
                    bits,
                },
            });
        }
        results
    }

    fn permute(&mut self) -> Measurement {
        use rand::Rng;

        let rounds = self.config.permutation_rounds;
        let vectors = self.config.iterations;
        let shifts: Vec<i64> = (0..rounds)
            .map(|_| self.rng.gen_range(0..i64::from(i32::MAX)))
            .collect();

        let mut ok = true;
        let mut current = HyperVec::ZERO;
        let mut scratch = HyperVec::ZERO;
        let mut elapsed_ns = 0f64;
        for _ in 0..vectors {
            let original = *random::random_uniform(&mut self.rng);
            current.copy_from(&original);

            let start = Instant::now();
            for &k in &shifts {
                permute_into(&current, k, &mut scratch);
                std::mem::swap(&mut current, &mut scratch);
            }
            for &k in shifts.iter().rev() {
                permute_into(&current, -k, &mut scratch);
                std::mem::swap(&mut current, &mut scratch);
            }
            elapsed_ns += start.elapsed().as_nanos() as f64;

            ok &= metrics::eq(&current, &original);
        }

        let calls = vectors * rounds * 2;
        Measurement {
            op: BenchOp::Permute,
            label: format!("rounds={rounds}"),
            calls,
            mean_ns: elapsed_ns / calls.max(1) as f64,
            check: Check::Equivalent(ok),
        }
    }
}
