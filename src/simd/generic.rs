//! Portable carry-save kernel.
//!
//! Works on every platform. Population counts use a Harley–Seal adder tree:
//! sixteen words are compressed through carry-save adders so that only one
//! word in sixteen needs a hardware `popcnt`.

use super::{BitKernel, IsaLevel};
use crate::hv::Word;

/// Words consumed per adder-tree iteration.
const BLOCK: usize = 16;

/// Portable kernel, no SIMD intrinsics.
#[derive(Debug, Clone, Copy)]
pub struct GenericKernel;

impl BitKernel for GenericKernel {
    fn isa_level(&self) -> IsaLevel {
        IsaLevel::Generic
    }

    fn and(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        assert_eq!(a.len(), out.len(), "output length mismatch");
        for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
            *o = x & y;
        }
    }

    fn or(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        assert_eq!(a.len(), out.len(), "output length mismatch");
        for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
            *o = x | y;
        }
    }

    fn xor(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        assert_eq!(a.len(), out.len(), "output length mismatch");
        for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
            *o = x ^ y;
        }
    }

    fn invert(&self, a: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), out.len(), "output length mismatch");
        for (o, &x) in out.iter_mut().zip(a) {
            *o = !x;
        }
    }

    fn active(&self, a: &[Word]) -> u32 {
        harley_seal(a.len(), |i| a[i])
    }

    fn hamming(&self, a: &[Word], b: &[Word]) -> u32 {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        harley_seal(a.len(), |i| a[i] ^ b[i])
    }
}

/// Carry-save adder: returns `(carry, sum)` with `a + b + c == 2 * carry + sum`
/// in every lane.
#[inline(always)]
pub(crate) fn csa(a: Word, b: Word, c: Word) -> (Word, Word) {
    let u = a ^ b;
    ((a & b) | (u & c), u ^ c)
}

/// Population count of `len` words produced by `word`.
#[inline(always)]
fn harley_seal(len: usize, word: impl Fn(usize) -> Word) -> u32 {
    let mut total: u32 = 0;
    let (mut ones, mut twos, mut fours, mut eights) = (0, 0, 0, 0);

    let blocks = len / BLOCK;
    for block in 0..blocks {
        let w = |k: usize| word(block * BLOCK + k);

        let (twos_a, o) = csa(ones, w(0), w(1));
        let (twos_b, o) = csa(o, w(2), w(3));
        let (fours_a, t) = csa(twos, twos_a, twos_b);
        let (twos_a, o) = csa(o, w(4), w(5));
        let (twos_b, o) = csa(o, w(6), w(7));
        let (fours_b, t) = csa(t, twos_a, twos_b);
        let (eights_a, f) = csa(fours, fours_a, fours_b);
        let (twos_a, o) = csa(o, w(8), w(9));
        let (twos_b, o) = csa(o, w(10), w(11));
        let (fours_a, t) = csa(t, twos_a, twos_b);
        let (twos_a, o) = csa(o, w(12), w(13));
        let (twos_b, o) = csa(o, w(14), w(15));
        let (fours_b, t) = csa(t, twos_a, twos_b);
        let (eights_b, f) = csa(f, fours_a, fours_b);
        let (sixteens, e) = csa(eights, eights_a, eights_b);

        total += sixteens.count_ones();
        ones = o;
        twos = t;
        fours = f;
        eights = e;
    }

    total = 16 * total
        + 8 * eights.count_ones()
        + 4 * fours.count_ones()
        + 2 * twos.count_ones()
        + ones.count_ones();

    for i in blocks * BLOCK..len {
        total += word(i).count_ones();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::reference;

    #[test]
    fn csa_is_a_full_adder() {
        for bits in 0..8u64 {
            let (a, b, c) = (bits & 1, (bits >> 1) & 1, (bits >> 2) & 1);
            let (carry, sum) = csa(a, b, c);
            assert_eq!(2 * carry + sum, a + b + c);
        }
    }

    #[test]
    fn adder_tree_matches_reference_on_patterned_words() {
        let words: Vec<Word> = (0..100u64)
            .map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ (i << 7))
            .collect();
        assert_eq!(GenericKernel.active(&words), reference::active(&words));
        let shifted: Vec<Word> = words.iter().map(|w| w.rotate_left(13)).collect();
        assert_eq!(
            GenericKernel.hamming(&words, &shifted),
            reference::hamming(&words, &shifted)
        );
    }
}
