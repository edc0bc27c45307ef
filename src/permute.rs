//! Invertible cyclic permutation.
//!
//! `permute(v, k)` moves bit `i` to position `(i + k) mod BITS`. The shift is
//! split into a whole-word rotation and an intra-word shift whose spill
//! carries into the neighbouring word, so the cost is one pass over the
//! words regardless of `k`. Permuting by `-k` undoes permuting by `k`
//! exactly, which is how positional binding is reversed.

use crate::hv::{self, BITS, HyperVec, WORD_BITS, WORDS};

/// Write `v` cyclically shifted by `k` bit positions into `out`.
///
/// Positive `k` moves bits towards higher indices. Any `k` is accepted and
/// taken modulo `BITS`.
pub fn permute_into(v: &HyperVec, k: i64, out: &mut HyperVec) {
    let shift = k.rem_euclid(BITS as i64) as usize;
    let word_shift = shift / WORD_BITS;
    let bit_shift = shift % WORD_BITS;

    let src = v.words();
    let dst = out.words_mut();

    // Source word that lands (before the bit shift) in destination word `j`.
    let source = |j: usize| {
        if j >= word_shift {
            j - word_shift
        } else {
            j + WORDS - word_shift
        }
    };

    if bit_shift == 0 {
        for (j, d) in dst.iter_mut().enumerate() {
            *d = src[source(j)];
        }
        return;
    }

    for (j, d) in dst.iter_mut().enumerate() {
        let s = source(j);
        let below = if s == 0 { WORDS - 1 } else { s - 1 };
        *d = (src[s] << bit_shift) | (src[below] >> (WORD_BITS - bit_shift));
    }
}

/// `v` cyclically shifted by `k`, newly allocated.
pub fn permute(v: &HyperVec, k: i64) -> Box<HyperVec> {
    let mut out = hv::allocate();
    permute_into(v, k, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{active, similarity};
    use crate::random::{HvRng, random_density, random_uniform};
    use rand::Rng;

    #[test]
    fn zero_shift_is_identity() {
        let mut rng = HvRng::seeded(1);
        let v = random_uniform(&mut rng);
        assert_eq!(permute(&v, 0), v);
        assert_eq!(permute(&v, BITS as i64), v);
        assert_eq!(permute(&v, -(BITS as i64) * 3), v);
    }

    #[test]
    fn single_bit_moves_by_k() {
        let cases: [(usize, i64, usize); 7] = [
            (0, 1, 1),
            (63, 1, 64),
            (64, -1, 63),
            (BITS - 1, 1, 0),
            (0, -1, BITS - 1),
            (5, 130, 135),
            (10, BITS as i64 + 7, 17),
        ];
        for (from, k, to) in cases {
            let mut v = HyperVec::ZERO;
            v.set_bit(from, true);
            let p = permute(&v, k);
            assert!(p.get_bit(to), "bit {from} shifted by {k} should land at {to}");
            assert_eq!(active(&p), 1);
        }
    }

    #[test]
    fn inverse_shift_restores_exactly() {
        let mut rng = HvRng::seeded(2);
        let v = random_density(&mut rng, 0.37);
        let mut shifts: Vec<i64> = vec![1, -1, 63, 64, 65, 127, 128, -4097, BITS as i64 - 1, BITS as i64 + 1];
        shifts.extend((0..100).map(|_| rng.gen_range(-4 * BITS as i64..4 * BITS as i64)));
        shifts.push(i64::MAX);
        shifts.push(i64::MIN + 1);

        for k in shifts {
            let forward = permute(&v, k);
            let back = permute(&forward, -k);
            assert_eq!(back, v, "k={k}");
        }
    }

    #[test]
    fn chained_shifts_compose() {
        let mut rng = HvRng::seeded(3);
        let v = random_uniform(&mut rng);
        let ks: Vec<i64> = (0..20).map(|_| rng.gen_range(-100_000..100_000)).collect();

        let mut forward = v.clone();
        for &k in &ks {
            forward = permute(&forward, k);
        }
        let total: i64 = ks.iter().sum();
        assert_eq!(forward, permute(&v, total));

        for &k in ks.iter().rev() {
            forward = permute(&forward, -k);
        }
        assert_eq!(forward, v);
    }

    #[test]
    fn permuted_vector_is_dissimilar() {
        let mut rng = HvRng::seeded(4);
        let v = random_uniform(&mut rng);
        let p = permute(&v, 1);
        let sim = similarity(&v, &p);
        assert!(sim > 0.45 && sim < 0.55, "sim={sim}");
        assert_eq!(active(&p), active(&v));
    }
}
