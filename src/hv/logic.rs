//! Word-parallel Boolean algebra over hypervectors.
//!
//! The `*_into` forms write into a caller-owned buffer and are dispatched
//! through the SIMD kernel. Because Rust forbids aliasing a shared and a
//! mutable borrow, in-place use goes through the `*_assign` forms instead,
//! which run the same kernel from a stack copy of the target.

use super::{HyperVec, WORDS};
use crate::simd;

/// `out = a & b`
pub fn and_into(a: &HyperVec, b: &HyperVec, out: &mut HyperVec) {
    simd::kernel().and(a.words(), b.words(), out.words_mut());
}

/// `out = a | b`
pub fn or_into(a: &HyperVec, b: &HyperVec, out: &mut HyperVec) {
    simd::kernel().or(a.words(), b.words(), out.words_mut());
}

/// `out = a ^ b`
pub fn xor_into(a: &HyperVec, b: &HyperVec, out: &mut HyperVec) {
    simd::kernel().xor(a.words(), b.words(), out.words_mut());
}

/// `out = !a`
pub fn invert_into(a: &HyperVec, out: &mut HyperVec) {
    simd::kernel().invert(a.words(), out.words_mut());
}

/// Exchange the first and second halves of `a` (bits `[0, D/2)` and `[D/2, D)`).
pub fn swap_halves_into(a: &HyperVec, out: &mut HyperVec) {
    const HALF: usize = WORDS / 2;
    let (lo, hi) = a.words().split_at(HALF);
    let (out_lo, out_hi) = out.words_mut().split_at_mut(HALF);
    out_lo.copy_from_slice(hi);
    out_hi.copy_from_slice(lo);
}

/// `a & b`, newly allocated.
pub fn and(a: &HyperVec, b: &HyperVec) -> Box<HyperVec> {
    let mut out = super::allocate();
    and_into(a, b, &mut out);
    out
}

/// `a | b`, newly allocated.
pub fn or(a: &HyperVec, b: &HyperVec) -> Box<HyperVec> {
    let mut out = super::allocate();
    or_into(a, b, &mut out);
    out
}

/// `a ^ b`, newly allocated.
pub fn xor(a: &HyperVec, b: &HyperVec) -> Box<HyperVec> {
    let mut out = super::allocate();
    xor_into(a, b, &mut out);
    out
}

/// `!a`, newly allocated.
pub fn invert(a: &HyperVec) -> Box<HyperVec> {
    let mut out = super::allocate();
    invert_into(a, &mut out);
    out
}

/// `target &= other`
pub fn and_assign(target: &mut HyperVec, other: &HyperVec) {
    let lhs = target.clone();
    simd::kernel().and(lhs.words(), other.words(), target.words_mut());
}

/// `target |= other`
pub fn or_assign(target: &mut HyperVec, other: &HyperVec) {
    let lhs = target.clone();
    simd::kernel().or(lhs.words(), other.words(), target.words_mut());
}

/// `target ^= other`
pub fn xor_assign(target: &mut HyperVec, other: &HyperVec) {
    let lhs = target.clone();
    simd::kernel().xor(lhs.words(), other.words(), target.words_mut());
}

/// `target = !target`
pub fn invert_in_place(target: &mut HyperVec) {
    let src = target.clone();
    simd::kernel().invert(src.words(), target.words_mut());
}
