//! AVX-512 (512-bit) kernel with native VPOPCNTDQ.
//!
//! Logic runs eight words per register; population counts use
//! `vpopcntq` directly, so no adder tree is needed at this tier.

use super::{BitKernel, IsaLevel};
use crate::hv::Word;

/// AVX-512F + VPOPCNTDQ kernel.
///
/// Only constructible through [`Avx512Kernel::new`], which checks CPU support.
#[derive(Debug, Clone, Copy)]
pub struct Avx512Kernel {
    _detected: (),
}

impl Avx512Kernel {
    /// Returns the kernel if the CPU supports AVX-512F and VPOPCNTDQ.
    pub fn new() -> Option<Self> {
        IsaLevel::Avx512
            .is_supported()
            .then_some(Self { _detected: () })
    }
}

#[cfg(target_arch = "x86_64")]
mod imp {
    use std::arch::x86_64::*;

    use crate::hv::Word;

    /// Words per 512-bit register.
    const LANES: usize = 8;

    pub(super) const AND: u8 = 0;
    pub(super) const OR: u8 = 1;
    pub(super) const XOR: u8 = 2;

    #[target_feature(enable = "avx512f")]
    pub(super) unsafe fn binary<const OP: u8>(a: &[Word], b: &[Word], out: &mut [Word]) {
        let regs = a.len() / LANES;
        for r in 0..regs {
            let offset = r * LANES;
            unsafe {
                let va = _mm512_loadu_si512(a.as_ptr().add(offset).cast());
                let vb = _mm512_loadu_si512(b.as_ptr().add(offset).cast());
                let result = match OP {
                    AND => _mm512_and_si512(va, vb),
                    OR => _mm512_or_si512(va, vb),
                    _ => _mm512_xor_si512(va, vb),
                };
                _mm512_storeu_si512(out.as_mut_ptr().add(offset).cast(), result);
            }
        }

        // Scalar tail
        for i in regs * LANES..a.len() {
            out[i] = match OP {
                AND => a[i] & b[i],
                OR => a[i] | b[i],
                _ => a[i] ^ b[i],
            };
        }
    }

    #[target_feature(enable = "avx512f")]
    pub(super) unsafe fn invert(a: &[Word], out: &mut [Word]) {
        let regs = a.len() / LANES;
        let ones = _mm512_set1_epi64(-1);
        for r in 0..regs {
            let offset = r * LANES;
            unsafe {
                let va = _mm512_loadu_si512(a.as_ptr().add(offset).cast());
                _mm512_storeu_si512(out.as_mut_ptr().add(offset).cast(), _mm512_xor_si512(va, ones));
            }
        }

        // Scalar tail
        for i in regs * LANES..a.len() {
            out[i] = !a[i];
        }
    }

    /// Population count of `a` (or of `a ^ b` when `XOR_B`).
    #[target_feature(enable = "avx512f,avx512vpopcntdq")]
    pub(super) unsafe fn popcount<const XOR_B: bool>(a: &[Word], b: &[Word]) -> u32 {
        let regs = a.len() / LANES;
        let mut total = _mm512_setzero_si512();

        for r in 0..regs {
            let offset = r * LANES;
            let v = unsafe {
                let va = _mm512_loadu_si512(a.as_ptr().add(offset).cast());
                if XOR_B {
                    _mm512_xor_si512(va, _mm512_loadu_si512(b.as_ptr().add(offset).cast()))
                } else {
                    va
                }
            };
            total = _mm512_add_epi64(total, _mm512_popcnt_epi64(v));
        }

        // Horizontal sum: store 8 x u64 and add.
        let mut lanes = [0u64; LANES];
        unsafe { _mm512_storeu_si512(lanes.as_mut_ptr().cast(), total) };
        let mut sum: u64 = lanes.iter().sum();

        // Scalar tail
        for i in regs * LANES..a.len() {
            let w = if XOR_B { a[i] ^ b[i] } else { a[i] };
            sum += u64::from(w.count_ones());
        }
        sum as u32
    }
}

#[cfg(target_arch = "x86_64")]
impl BitKernel for Avx512Kernel {
    fn isa_level(&self) -> IsaLevel {
        IsaLevel::Avx512
    }

    fn and(&self, a: &[Word], b: &[Word], out: &mut [Word]) {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        assert_eq!(a.len(), out.len(), "output length mismatch");
        // Safety: construction checked AVX-512F and VPOPCNTDQ support; the
        // asserts above keep every pointer access inside the slices.
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
        unsafe { imp::popcount::<false>(a, a) }
    }

    fn hamming(&self, a: &[Word], b: &[Word]) -> u32 {
        assert_eq!(a.len(), b.len(), "operand length mismatch");
        unsafe { imp::popcount::<true>(a, b) }
    }
}

// Never constructed off x86_64 (`new` returns `None`); this keeps the type usable.
#[cfg(not(target_arch = "x86_64"))]
impl BitKernel for Avx512Kernel {
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
