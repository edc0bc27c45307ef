//! Density-controlled random hypervectors.
//!
//! Three strategies, cheapest first for the density they serve:
//!
//! - **Uniform** (`p = 0.5`): one RNG word per storage word.
//! - **Power of two** (`p = 2^-e`): AND of `e` uniform draws, exact.
//! - **Arbitrary** (`p ∈ [0, 1]`): binary-expansion tree. Each uniform draw
//!   splits the still-undecided lanes into two halves; the next binary digit
//!   of `p` fixes one half (to 1 if the digit is 1, to 0 otherwise) and the
//!   other half recurses on the residual. A word stops drawing as soon as
//!   every lane is decided or the remaining digits are all zero.
//!
//! All randomness flows through an explicit [`HvRng`] context, so tests can
//! seed it and callers decide how it is shared.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::hv::{self, HyperVec, Word};

/// Default number of binary digits of `p` honoured by [`random_density_into`].
///
/// The realised density is within `2^-(DEFAULT_DENSITY_DEPTH + 1)` of the target.
pub const DEFAULT_DENSITY_DEPTH: u32 = 32;

/// Largest supported expansion depth.
pub const MAX_DENSITY_DEPTH: u32 = 63;

/// Random number source for generation.
///
/// Wraps a ChaCha-based [`StdRng`]. Not shared implicitly: callers that need
/// one stream across threads must serialize access themselves.
#[derive(Debug, Clone)]
pub struct HvRng {
    inner: StdRng,
}

impl HvRng {
    /// Seed from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self {
            inner: StdRng::from_entropy(),
        }
    }

    /// Deterministic stream for tests and reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// One uniformly random word.
    #[inline]
    pub fn next_word(&mut self) -> Word {
        self.inner.next_u64()
    }
}

impl Default for HvRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RngCore for HvRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// Fill `out` with i.i.d. bits of density 0.5.
pub fn random_uniform_into(rng: &mut HvRng, out: &mut HyperVec) {
    rng.inner.fill(&mut out.words_mut()[..]);
}

/// Fill `out` with bits of density exactly `2^-e`.
///
/// `e = 0` gives the all-one vector.
pub fn random_pow2_into(rng: &mut HvRng, out: &mut HyperVec, e: u32) {
    if e == 0 {
        out.copy_from(&HyperVec::ONE);
        return;
    }
    random_uniform_into(rng, out);
    for _ in 1..e {
        for w in out.words_mut().iter_mut() {
            *w &= rng.next_word();
        }
    }
}

/// Fill `out` with bits of density exactly `1 - 2^-e`, the complement of
/// [`random_pow2_into`], by OR-ing `e` uniform draws.
///
/// `e = 0` gives the all-zero vector.
pub fn random_pow2_dense_into(rng: &mut HvRng, out: &mut HyperVec, e: u32) {
    if e == 0 {
        out.clear();
        return;
    }
    random_uniform_into(rng, out);
    for _ in 1..e {
        for w in out.words_mut().iter_mut() {
            *w |= rng.next_word();
        }
    }
}

/// A target density, expanded once into binary digits.
///
/// Building the plan is the only floating-point work; sampling is pure
/// word operations, so hot loops should build a plan once and reuse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityPlan {
    /// Digits of `p` after the binary point, most significant in bit 63.
    digits: u64,
    /// Significant digits (trailing zeros trimmed).
    len: u32,
    /// `p` rounded up to exactly 1.
    saturated: bool,
    depth: u32,
}

impl DensityPlan {
    /// Expand `p` to `depth` binary digits, rounding to nearest.
    ///
    /// # Panics
    ///
    /// If `p` is not in `[0, 1]` or `depth` is not in `1..=MAX_DENSITY_DEPTH`.
    pub fn new(p: f64, depth: u32) -> Self {
        assert!(
            (0.0..=1.0).contains(&p),
            "density must be in [0, 1], got {p}"
        );
        assert!(
            (1..=MAX_DENSITY_DEPTH).contains(&depth),
            "density depth must be in 1..={MAX_DENSITY_DEPTH}, got {depth}"
        );

        let scale = (1u64 << depth) as f64;
        let scaled = (p * scale).round() as u64;
        if scaled >= 1u64 << depth {
            return Self {
                digits: 0,
                len: 0,
                saturated: true,
                depth,
            };
        }

        let len = if scaled == 0 {
            0
        } else {
            depth - scaled.trailing_zeros()
        };
        Self {
            digits: scaled << (64 - depth),
            len,
            saturated: false,
            depth,
        }
    }

    /// The density this plan realises exactly.
    pub fn density(&self) -> f64 {
        if self.saturated {
            return 1.0;
        }
        (self.digits >> (64 - self.depth)) as f64 / (1u64 << self.depth) as f64
    }

    /// Number of digits a word may consume before it is fully decided.
    pub fn significant_digits(&self) -> u32 {
        self.len
    }

    #[inline(always)]
    fn digit(&self, i: u32) -> bool {
        (self.digits >> (63 - i)) & 1 == 1
    }

    /// One word of bits with this plan's density.
    #[inline]
    pub fn sample_word(&self, rng: &mut HvRng) -> Word {
        if self.saturated {
            return Word::MAX;
        }
        let mut result: Word = 0;
        let mut undecided = Word::MAX;
        for i in 0..self.len {
            let split = rng.next_word();
            if self.digit(i) {
                result |= undecided & split;
                undecided &= !split;
            } else {
                undecided &= split;
            }
            if undecided == 0 {
                break;
            }
        }
        result
    }
}

/// Fill `out` with bits of density `p`, to [`DEFAULT_DENSITY_DEPTH`] digits.
pub fn random_density_into(rng: &mut HvRng, out: &mut HyperVec, p: f64) {
    random_plan_into(rng, out, &DensityPlan::new(p, DEFAULT_DENSITY_DEPTH));
}

/// Fill `out` using a prepared [`DensityPlan`].
pub fn random_plan_into(rng: &mut HvRng, out: &mut HyperVec, plan: &DensityPlan) {
    for w in out.words_mut().iter_mut() {
        *w = plan.sample_word(rng);
    }
}

/// Deterministically map `a` to a uniform-looking vector.
///
/// Equal inputs give equal outputs; the shared [`HvRng`] is not touched.
pub fn rehash_into(a: &HyperVec, out: &mut HyperVec) {
    let mut state: [u64; 4] = [
        0x243F_6A88_85A3_08D3,
        0x1319_8A2E_0370_7344,
        0xA409_3822_299F_31D0,
        0x082E_FA98_EC4E_6C89,
    ];
    for (i, &w) in a.words().iter().enumerate() {
        let lane = i % state.len();
        state[lane] = splitmix64(state[lane] ^ w);
    }
    for lane in 0..state.len() {
        state[lane] = splitmix64(state[lane] ^ state[(lane + 1) % state.len()]);
    }

    let mut seed = [0u8; 32];
    for (chunk, s) in seed.chunks_exact_mut(8).zip(state) {
        chunk.copy_from_slice(&s.to_le_bytes());
    }
    StdRng::from_seed(seed).fill(&mut out.words_mut()[..]);
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Uniform vector, newly allocated.
pub fn random_uniform(rng: &mut HvRng) -> Box<HyperVec> {
    let mut out = hv::allocate();
    random_uniform_into(rng, &mut out);
    out
}

/// Density `2^-e` vector, newly allocated.
pub fn random_pow2(rng: &mut HvRng, e: u32) -> Box<HyperVec> {
    let mut out = hv::allocate();
    random_pow2_into(rng, &mut out, e);
    out
}

/// Density `p` vector, newly allocated.
pub fn random_density(rng: &mut HvRng, p: f64) -> Box<HyperVec> {
    let mut out = hv::allocate();
    random_density_into(rng, &mut out, p);
    out
}

/// Rehash of `a`, newly allocated.
pub fn rehash(a: &HyperVec) -> Box<HyperVec> {
    let mut out = hv::allocate();
    rehash_into(a, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hv::BITS;
    use crate::metrics::{active, hamming};

    /// Mean density over `samples` vectors produced by `fill`.
    fn observed_density(samples: usize, mut fill: impl FnMut(&mut HyperVec)) -> f64 {
        let mut buf = HyperVec::ZERO;
        let mut total = 0u64;
        for _ in 0..samples {
            fill(&mut buf);
            total += u64::from(active(&buf));
        }
        total as f64 / (samples * BITS) as f64
    }

    /// Five standard deviations of a Bernoulli mean over `samples` vectors.
    fn tolerance(p: f64, samples: usize) -> f64 {
        5.0 * (p * (1.0 - p) / (samples * BITS) as f64).sqrt()
    }

    #[test]
    fn uniform_is_half_dense() {
        let mut rng = HvRng::seeded(1);
        let observed = observed_density(200, |out| random_uniform_into(&mut rng, out));
        assert!((observed - 0.5).abs() < tolerance(0.5, 200), "observed={observed}");
    }

    #[test]
    fn uniform_draws_are_independent() {
        let mut rng = HvRng::seeded(2);
        let a = random_uniform(&mut rng);
        let b = random_uniform(&mut rng);
        let d = f64::from(hamming(&a, &b)) / BITS as f64;
        assert!((d - 0.5).abs() < 0.03, "distance={d}");
    }

    #[test]
    fn pow2_matches_exact_density() {
        let mut rng = HvRng::seeded(3);
        for e in 1..=8u32 {
            let p = 2f64.powi(-(e as i32));
            let observed = observed_density(300, |out| random_pow2_into(&mut rng, out, e));
            assert!(
                (observed - p).abs() < tolerance(p, 300),
                "e={e} observed={observed} expected={p}"
            );
        }
    }

    #[test]
    fn pow2_dense_is_the_complement_density() {
        let mut rng = HvRng::seeded(4);
        for e in 1..=6u32 {
            let p = 1.0 - 2f64.powi(-(e as i32));
            let observed = observed_density(300, |out| random_pow2_dense_into(&mut rng, out, e));
            assert!(
                (observed - p).abs() < tolerance(p, 300),
                "e={e} observed={observed} expected={p}"
            );
        }
    }

    #[test]
    fn pow2_zero_exponent_edges() {
        let mut rng = HvRng::seeded(5);
        assert_eq!(*random_pow2(&mut rng, 0), HyperVec::ONE);
        let mut out = HyperVec::ONE;
        random_pow2_dense_into(&mut rng, &mut out, 0);
        assert_eq!(out, HyperVec::ZERO);
    }

    #[test]
    fn density_converges_across_the_range() {
        let mut rng = HvRng::seeded(6);
        for p in [0.001, 0.01, 0.1, 1.0 / 3.0, 0.5, 0.6180, 0.9, 0.99, 0.999] {
            let observed = observed_density(500, |out| random_density_into(&mut rng, out, p));
            assert!(
                (observed - p).abs() < tolerance(p, 500),
                "p={p} observed={observed}"
            );
        }
    }

    #[test]
    fn density_extremes_are_exact() {
        let mut rng = HvRng::seeded(7);
        assert_eq!(*random_density(&mut rng, 0.0), HyperVec::ZERO);
        assert_eq!(*random_density(&mut rng, 1.0), HyperVec::ONE);
        // Below half of the last honoured digit rounds to zero.
        assert_eq!(*random_density(&mut rng, 1e-12), HyperVec::ZERO);
    }

    #[test]
    #[should_panic(expected = "density must be in [0, 1]")]
    fn density_out_of_range_panics() {
        let mut rng = HvRng::seeded(8);
        random_density(&mut rng, 1.5);
    }

    #[test]
    fn plan_expansion_and_rounding() {
        let half = DensityPlan::new(0.5, DEFAULT_DENSITY_DEPTH);
        assert_eq!(half.significant_digits(), 1);
        assert_eq!(half.density(), 0.5);

        let three_eighths = DensityPlan::new(0.375, DEFAULT_DENSITY_DEPTH);
        assert_eq!(three_eighths.significant_digits(), 3);
        assert_eq!(three_eighths.density(), 0.375);

        assert_eq!(DensityPlan::new(0.0, 8).significant_digits(), 0);
        assert_eq!(DensityPlan::new(0.999, 8).density(), 1.0);

        for depth in [4, 10, 24, 32] {
            let plan = DensityPlan::new(0.1, depth);
            let bound = 2f64.powi(-(depth as i32 + 1));
            assert!((plan.density() - 0.1).abs() <= bound, "depth={depth}");
            assert!(plan.significant_digits() <= depth);
        }
    }

    #[test]
    fn coarse_plan_realises_its_rounded_density() {
        let mut rng = HvRng::seeded(9);
        // 0.3 at 3 digits rounds to 0.25 (binary 0.010).
        let plan = DensityPlan::new(0.3, 3);
        assert_eq!(plan.density(), 0.25);
        let observed = observed_density(300, |out| random_plan_into(&mut rng, out, &plan));
        assert!((observed - 0.25).abs() < tolerance(0.25, 300), "observed={observed}");
    }

    #[test]
    fn seeded_streams_reproduce() {
        let a = random_density(&mut HvRng::seeded(42), 0.3);
        let b = random_density(&mut HvRng::seeded(42), 0.3);
        assert_eq!(a, b);
    }

    #[test]
    fn rehash_is_deterministic_and_uniform() {
        let mut rng = HvRng::seeded(10);
        let a = random_density(&mut rng, 0.05);
        let h1 = rehash(&a);
        let h2 = rehash(&a);
        assert_eq!(h1, h2);

        let mut b = (*a).clone();
        b.set_bit(17, !b.get_bit(17));
        let hb = rehash(&b);
        let d = f64::from(hamming(&h1, &hb)) / BITS as f64;
        assert!((d - 0.5).abs() < 0.03, "distance={d}");

        let density = f64::from(active(&h1)) / BITS as f64;
        assert!((density - 0.5).abs() < 0.03, "density={density}");
    }
}
