//! AVX2 (256-bit) kernel for x86_64.
//!
//! Population counts run the Harley–Seal carry-save tree over sixteen
//! registers per iteration and count the surviving registers with the
//! nibble-lookup (`vpshufb` + `vpsadbw`) method. Tails that do not fill a
//! register fall through to scalar code.

use super::{BitKernel, IsaLevel};
use crate::hv::Word;

/// AVX2-accelerated kernel.
///
/// Only constructible through [`Avx2Kernel::new`], which checks CPU support,
/// so the kernel methods never re-check per call.
#[derive(Debug, Clone, Copy)]
pub struct Avx2Kernel {
    _detected: (),
}

impl Avx2Kernel {
    /// Returns the kernel if the CPU supports AVX2.
    pub fn new() -> Option<Self> {
        IsaLevel::Avx2
            .is_supported()
            .then_some(Self { _detected: () })
    }
}

#[cfg(target_arch = "x86_64")]
mod imp {
    use std::arch::x86_64::*;

    use crate::hv::Word;

    /// Words per 256-bit register.
    pub(super) const LANES: usize = 4;
    /// Registers consumed per adder-tree iteration.
    const BLOCK: usize = 16;

    pub(super) const AND: u8 = 0;
    pub(super) const OR: u8 = 1;
    pub(super) const XOR: u8 = 2;

    #[inline(always)]
    fn apply_scalar<const OP: u8>(x: Word, y: Word) -> Word {
        match OP {
            AND => x & y,
            OR => x | y,
            _ => x ^ y,
        }
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn binary<const OP: u8>(a: &[Word], b: &[Word], out: &mut [Word]) {
        let regs = a.len() / LANES;
        for r in 0..regs {
            let offset = r * LANES;
            unsafe {
                let va = _mm256_loadu_si256(a.as_ptr().add(offset).cast());
                let vb = _mm256_loadu_si256(b.as_ptr().add(offset).cast());
                let result = match OP {
                    AND => _mm256_and_si256(va, vb),
                    OR => _mm256_or_si256(va, vb),
                    _ => _mm256_xor_si256(va, vb),
                };
                _mm256_storeu_si256(out.as_mut_ptr().add(offset).cast(), result);
            }
        }

        // Scalar tail
        for i in regs * LANES..a.len() {
            out[i] = apply_scalar::<OP>(a[i], b[i]);
        }
    }

    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn invert(a: &[Word], out: &mut [Word]) {
        let regs = a.len() / LANES;
        let ones = _mm256_set1_epi64x(-1);
        for r in 0..regs {
            let offset = r * LANES;
            unsafe {
                let va = _mm256_loadu_si256(a.as_ptr().add(offset).cast());
                _mm256_storeu_si256(out.as_mut_ptr().add(offset).cast(), _mm256_xor_si256(va, ones));
            }
        }

        // Scalar tail
        for i in regs * LANES..a.len() {
            out[i] = !a[i];
        }
    }

    /// Per-64-bit-lane population count of `v`.
    #[target_feature(enable = "avx2")]
    #[inline]
    fn popcount256(v: __m256i) -> __m256i {
        let lookup = _mm256_setr_epi8(
            0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4, //
            0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4,
        );
        let low_mask = _mm256_set1_epi8(0x0f);
        let lo = _mm256_and_si256(v, low_mask);
        let hi = _mm256_and_si256(_mm256_srli_epi16(v, 4), low_mask);
        let counts = _mm256_add_epi8(
            _mm256_shuffle_epi8(lookup, lo),
            _mm256_shuffle_epi8(lookup, hi),
        );
        _mm256_sad_epu8(counts, _mm256_setzero_si256())
    }

    /// Carry-save adder over 256-bit registers: `(carry, sum)`.
    #[target_feature(enable = "avx2")]
    #[inline]
    fn csa(a: __m256i, b: __m256i, c: __m256i) -> (__m256i, __m256i) {
        let u = _mm256_xor_si256(a, b);
        let carry = _mm256_or_si256(_mm256_and_si256(a, b), _mm256_and_si256(u, c));
        (carry, _mm256_xor_si256(u, c))
    }

    /// Load register `r` of `a`, XORed with register `r` of `b` when `XOR_B`.
    #[target_feature(enable = "avx2")]
    #[inline]
    unsafe fn load<const XOR_B: bool>(a: &[Word], b: &[Word], r: usize) -> __m256i {
        debug_assert!((r + 1) * LANES <= a.len());
        unsafe {
            let va = _mm256_loadu_si256(a.as_ptr().add(r * LANES).cast());
            if XOR_B {
                _mm256_xor_si256(va, _mm256_loadu_si256(b.as_ptr().add(r * LANES).cast()))
            } else {
                va
            }
        }
    }

    /// Horizontal sum of the four 64-bit lanes.
    #[target_feature(enable = "avx2")]
    #[inline]
    fn hsum_epi64(v: __m256i) -> u64 {
        let mut lanes = [0u64; LANES];
        unsafe { _mm256_storeu_si256(lanes.as_mut_ptr().cast(), v) };
        lanes.iter().sum()
    }

    /// Population count of `a` (or of `a ^ b` when `XOR_B`).
    #[target_feature(enable = "avx2")]
    pub(super) unsafe fn harley_seal<const XOR_B: bool>(a: &[Word], b: &[Word]) -> u32 {
        let regs = a.len() / LANES;
        let blocks = regs / BLOCK;

        let zero = _mm256_setzero_si256();
        let (mut total, mut ones, mut twos, mut fours, mut eights) = (zero, zero, zero, zero, zero);

        for block in 0..blocks {
            let base = block * BLOCK;
            let v = |k: usize| unsafe { load::<XOR_B>(a, b, base + k) };

            let (twos_a, o) = csa(ones, v(0), v(1));
            let (twos_b, o) = csa(o, v(2), v(3));
            let (fours_a, t) = csa(twos, twos_a, twos_b);
            let (twos_a, o) = csa(o, v(4), v(5));
            let (twos_b, o) = csa(o, v(6), v(7));
            let (fours_b, t) = csa(t, twos_a, twos_b);
            let (eights_a, f) = csa(fours, fours_a, fours_b);
            let (twos_a, o) = csa(o, v(8), v(9));
            let (twos_b, o) = csa(o, v(10), v(11));
            let (fours_a, t) = csa(t, twos_a, twos_b);
            let (twos_a, o) = csa(o, v(12), v(13));
            let (twos_b, o) = csa(o, v(14), v(15));
            let (fours_b, t) = csa(t, twos_a, twos_b);
            let (eights_b, f) = csa(f, fours_a, fours_b);
            let (sixteens, e) = csa(eights, eights_a, eights_b);

            total = _mm256_add_epi64(total, popcount256(sixteens));
            ones = o;
            twos = t;
            fours = f;
            eights = e;
        }

        total = _mm256_slli_epi64(total, 4);
        total = _mm256_add_epi64(total, _mm256_slli_epi64(popcount256(eights), 3));
        total = _mm256_add_epi64(total, _mm256_slli_epi64(popcount256(fours), 2));
        total = _mm256_add_epi64(total, _mm256_slli_epi64(popcount256(twos), 1));
        total = _mm256_add_epi64(total, popcount256(ones));

        for r in blocks * BLOCK..regs {
            total = _mm256_add_epi64(total, popcount256(unsafe { load::<XOR_B>(a, b, r) }));
        }

        let mut sum = hsum_epi64(total);

        // Scalar tail
        for i in regs * LANES..a.len() {
            let w = if XOR_B { a[i] ^ b[i] } else { a[i] };
            sum += u64::from(w.count_ones());
        }
        sum as u32
    }
}

#[cfg(target_arch = "x86_64")]
impl BitKernel for Avx2Kernel {
    fn isa_level(&self) -> IsaLevel {
        IsaLevel::Avx2
    }

    fn and(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        assert_eq!(a.len(), out.len(), "output length mismatch");
        // Safety: construction checked AVX2 support; the asserts above keep every
        // pointer access inside the slices.
        unsafe { imp::binary::<{ imp::AND }>(a, b, out) }
    }

    fn or(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        assert_eq!(a.len(), out.len(), "output length mismatch");
        unsafe { imp::binary::<{ imp::OR }>(a, b, out) }
    }

    fn xor(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        assert_eq!(a.len(), out.len(), "output length mismatch");
        unsafe { imp::binary::<{ imp::XOR }>(a, b, out) }
    }

    fn invert(&self, a: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), out.len(), "output length mismatch");
        unsafe { imp::invert(a, out) }
    }

    fn active(&self, a: &[Word]) -> u32 {
        unsafe { imp::harley_seal::<false>(a, a) }
    }

    fn hamming(&self, a: &[Word], b: &[Word]) -> u32 {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        unsafe { imp::harley_seal::<true>(a, b) }
    }
}

// Never constructed off x86_64 (`new` returns `None`); this keeps the type usable.
#[cfg(not(target_arch = "x86_64"))]
impl BitKernel for Avx2Kernel {
    fn isa_level(&self) -> IsaLevel {
        IsaLevel::Generic
    }
    fn and(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        super::generic::GenericKernel.and(a, b, out);
    }
    fn or(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        super::generic::GenericKernel.or(a, b, out);
    }
    fn xor(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        super::generic::GenericKernel.xor(a, b, out);
    }
    fn invert(&self, a: &[Word], out: &mut [Word]) {
        super::generic::GenericKernel.invert(a, out);
    }
    fn active(&self, a: &[Word]) -> u32 {
        super::generic::GenericKernel.active(a)
    }
    fn hamming(&self, a: &[Word], b: &[Word]) -> u32 {
        super::generic::GenericKernel.hamming(a, b)
    }
}
