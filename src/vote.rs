//! Bit-sliced majority and threshold voting.
//!
//! Counting votes bit by bit costs `O(n·D)`. Instead every lane of a word is
//! counted in parallel: the running count of each lane is kept in binary
//! across `k = ⌈log2(n+1)⌉` *counter planes* (plane `j` holds bit `j` of
//! every lane's count). Folding in one input is a ripple-carry increment of
//! that k-bit counter, masked to the lanes where the input bit is set:
//!
//! ```text
//! carry   = plane[j] & x
//! plane[j] ^= x
//! x       = carry        // stop as soon as x == 0
//! ```
//!
//! The carry dies out after one or two planes on average, so folding costs
//! amortised `O(1)` word operations per input word. The final decision
//! `count > t` is a fixed comparator over the planes, evaluated from the most
//! significant plane down.
//!
//! Inputs are processed one 64-byte line at a time so the planes for that
//! line stay in registers or L1 while all `n` inputs stream past.
//!
//! # Threshold semantics
//!
//! An output bit is 1 iff **strictly more** than `t` inputs have it set:
//! `t = 0` is the OR of the inputs, `t = n - 1` their AND, and `t = n` the
//! all-zero vector. Majority uses `t = ⌊n/2⌋`, so with even `n` a tie is
//! not a majority and yields 0.

use crate::hv::{self, HyperVec, LINE_WORDS, WORDS, Word};

/// One cache line of words.
type Line = [Word; LINE_WORDS];

/// Enough planes for any `n` that fits in a `usize`.
const MAX_PLANES: usize = usize::BITS as usize;

/// Planes needed to hold counts in `[0, n]`.
fn plane_count(n: usize) -> usize {
    (usize::BITS - n.leading_zeros()) as usize
}

fn line_of(v: &HyperVec, base: usize) -> Line {
    let mut line = [0; LINE_WORDS];
    line.copy_from_slice(&v.words()[base..base + LINE_WORDS]);
    line
}

/// Add `x` (one vote per set lane) into the counter planes.
#[inline(always)]
fn increment(planes: &mut [Line], mut x: Line) {
    for plane in planes {
        let mut any = 0;
        for lane in 0..LINE_WORDS {
            let carry = plane[lane] & x[lane];
            plane[lane] ^= x[lane];
            x[lane] = carry;
            any |= carry;
        }
        if any == 0 {
            return;
        }
    }
    debug_assert!(x.iter().all(|&w| w == 0), "counter planes overflowed");
}

/// Lanes whose count (in `planes`, least significant first) exceeds `t`.
#[inline(always)]
fn greater_than(planes: &[Line], t: usize) -> Line {
    let mut gt = [0; LINE_WORDS];
    let mut eq = [Word::MAX; LINE_WORDS];
    for (j, plane) in planes.iter().enumerate().rev() {
        if (t >> j) & 1 == 1 {
            for lane in 0..LINE_WORDS {
                eq[lane] &= plane[lane];
            }
        } else {
            for lane in 0..LINE_WORDS {
                gt[lane] |= eq[lane] & plane[lane];
                eq[lane] &= !plane[lane];
            }
        }
    }
    gt
}

/// Set each bit of `out` to 1 iff more than `threshold` of `inputs` have it set.
///
/// # Panics
///
/// If `inputs` is empty or `threshold > inputs.len()`.
pub fn threshold_into<V: AsRef<HyperVec>>(inputs: &[V], threshold: usize, out: &mut HyperVec) {
    let n = inputs.len();
    assert!(n > 0, "threshold vote needs at least one input");
    assert!(
        threshold <= n,
        "threshold {threshold} out of range for {n} inputs"
    );

    match (n, threshold) {
        (1, 0) => return out.copy_from(inputs[0].as_ref()),
        (3, 1) => {
            return majority3_into(inputs[0].as_ref(), inputs[1].as_ref(), inputs[2].as_ref(), out);
        }
        _ => {}
    }

    let k = plane_count(n);
    let mut planes = [[0 as Word; LINE_WORDS]; MAX_PLANES];
    let planes = &mut planes[..k];

    for base in (0..WORDS).step_by(LINE_WORDS) {
        for plane in planes.iter_mut() {
            *plane = [0; LINE_WORDS];
        }
        for v in inputs {
            increment(planes, line_of(v.as_ref(), base));
        }
        out.words_mut()[base..base + LINE_WORDS].copy_from_slice(&greater_than(planes, threshold));
    }
}

/// Strict per-bit majority: threshold `⌊n/2⌋`. Ties (even `n`) yield 0.
///
/// # Panics
///
/// If `inputs` is empty.
pub fn majority_into<V: AsRef<HyperVec>>(inputs: &[V], out: &mut HyperVec) {
    threshold_into(inputs, inputs.len() / 2, out);
}

/// Majority of three: `(a & b) | (a & c) | (b & c)`.
pub fn majority3_into(a: &HyperVec, b: &HyperVec, c: &HyperVec, out: &mut HyperVec) {
    let lanes = a.words().iter().zip(b.words()).zip(c.words());
    for (o, ((&x, &y), &z)) in out.words_mut().iter_mut().zip(lanes) {
        *o = (x & y) | (x & z) | (y & z);
    }
}

/// Majority vote, newly allocated.
pub fn majority<V: AsRef<HyperVec>>(inputs: &[V]) -> Box<HyperVec> {
    let mut out = hv::allocate();
    majority_into(inputs, &mut out);
    out
}

/// Threshold vote, newly allocated.
pub fn threshold<V: AsRef<HyperVec>>(inputs: &[V], threshold: usize) -> Box<HyperVec> {
    let mut out = hv::allocate();
    threshold_into(inputs, threshold, &mut out);
    out
}

/// Per-bit counting version of [`threshold_into`], `O(n·D)`. For validation only.
pub fn threshold_into_reference<V: AsRef<HyperVec>>(inputs: &[V], threshold: usize, out: &mut HyperVec) {
    let n = inputs.len();
    assert!(n > 0, "threshold vote needs at least one input");
    assert!(
        threshold <= n,
        "threshold {threshold} out of range for {n} inputs"
    );
    for bit in 0..hv::BITS {
        let count = inputs.iter().filter(|&v| v.as_ref().get_bit(bit)).count();
        out.set_bit(bit, count > threshold);
    }
}

/// Streaming bit-sliced counter.
///
/// Keeps the counter planes between calls so vectors can be folded in one
/// at a time (for example while bundling a growing set) and thresholded at
/// any point. Planes are added as the count crosses powers of two.
#[derive(Debug, Clone, Default)]
pub struct BitCounter {
    planes: Vec<HyperVec>,
    count: usize,
}

impl BitCounter {
    /// An empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors folded in so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of counter planes currently held.
    pub fn planes(&self) -> usize {
        self.planes.len()
    }

    /// Fold one vector into the counts.
    pub fn add(&mut self, v: &HyperVec) {
        self.count += 1;
        if plane_count(self.count) > self.planes.len() {
            self.planes.push(HyperVec::ZERO);
        }

        for w in 0..WORDS {
            let mut x = v.words()[w];
            for plane in self.planes.iter_mut() {
                if x == 0 {
                    break;
                }
                let word = &mut plane.words_mut()[w];
                let carry = *word & x;
                *word ^= x;
                x = carry;
            }
        }
    }

    /// Exact count of vectors with bit `index` set.
    pub fn count_at(&self, index: usize) -> usize {
        self.planes
            .iter()
            .enumerate()
            .map(|(j, plane)| usize::from(plane.get_bit(index)) << j)
            .sum()
    }

    /// Write bits counted more than `threshold` times into `out`.
    ///
    /// # Panics
    ///
    /// If nothing has been added or `threshold > count`.
    pub fn threshold_into(&self, threshold: usize, out: &mut HyperVec) {
        assert!(self.count > 0, "threshold vote needs at least one input");
        assert!(
            threshold <= self.count,
            "threshold {threshold} out of range for {} inputs",
            self.count
        );

        let mut lines = [[0 as Word; LINE_WORDS]; MAX_PLANES];
        let lines = &mut lines[..self.planes.len()];
        for base in (0..WORDS).step_by(LINE_WORDS) {
            for (line, plane) in lines.iter_mut().zip(&self.planes) {
                *line = line_of(plane, base);
            }
            out.words_mut()[base..base + LINE_WORDS].copy_from_slice(&greater_than(lines, threshold));
        }
    }

    /// Strict majority of everything added so far.
    pub fn majority_into(&self, out: &mut HyperVec) {
        self.threshold_into(self.count / 2, out);
    }

    /// Forget all counts, keeping the plane allocation.
    pub fn reset(&mut self) {
        for plane in &mut self.planes {
            plane.clear();
        }
        self.count = 0;
    }
}
