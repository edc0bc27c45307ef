//! Scalar reference kernels.
//!
//! Word-by-word `count_ones`. These are the ground truth every hardware tier
//! is validated against; they are not used on any hot path.

use crate::hv::Word;

/// Number of set bits in `a`.
pub fn active(a: &[Word]) -> u32 {
    a.iter().map(|w| w.count_ones()).sum()
}

/// Number of positions where `a` and `b` differ.
pub fn hamming(a: &[Word], b: &[Word]) -> u32 {
    assert_eq!(a.len(), b.len(), "operand length mismatch");
    a.iter().zip(b).map(|(&x, &y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_single_words() {
        assert_eq!(active(&[0]), 0);
        assert_eq!(active(&[1, 1 << 63]), 2);
        assert_eq!(active(&[Word::MAX; 3]), 192);
    }

    #[test]
    fn hamming_counts_differences() {
        assert_eq!(hamming(&[0b1010], &[0b0110]), 2);
        assert_eq!(hamming(&[Word::MAX], &[0]), 64);
        assert_eq!(hamming(&[], &[]), 0);
    }
}
