//! Population and distance metrics.
//!
//! [`active`] and [`hamming`] go through the dispatched kernel; the
//! `*_reference` variants use the scalar ground truth and exist for
//! validation only.

use crate::hv::{BITS, HyperVec};
use crate::simd::{self, reference};

/// Number of set bits, in `[0, BITS]`.
pub fn active(v: &HyperVec) -> u32 {
    simd::kernel().active(v.words())
}

/// Number of differing bit positions. Always equal to `active(a ^ b)`.
pub fn hamming(a: &HyperVec, b: &HyperVec) -> u32 {
    simd::kernel().hamming(a.words(), b.words())
}

/// Scalar [`active`].
pub fn active_reference(v: &HyperVec) -> u32 {
    reference::active(v.words())
}

/// Scalar [`hamming`].
pub fn hamming_reference(a: &HyperVec, b: &HyperVec) -> u32 {
    reference::hamming(a.words(), b.words())
}

/// Bit-exact equality.
pub fn eq(a: &HyperVec, b: &HyperVec) -> bool {
    a.words() == b.words()
}

/// Fraction of set bits.
pub fn density(v: &HyperVec) -> f64 {
    f64::from(active(v)) / BITS as f64
}

/// Normalized similarity `1 - hamming / BITS`: 1.0 for identical vectors,
/// about 0.5 for unrelated uniform ones.
pub fn similarity(a: &HyperVec, b: &HyperVec) -> f64 {
    1.0 - f64::from(hamming(a, b)) / BITS as f64
}
