//! Hardware-tiered bit kernels.
//!
//! This module provides a [`BitKernel`] trait with CPU-specific implementations.
//! At runtime, [`detect_isa`] determines the best available instruction set and
//! [`kernel`] returns the fastest implementation, chosen once per process.
//!
//! # Supported ISA levels
//!
//! - **Generic**: portable carry-save (Harley–Seal) adder tree on `u64` words
//! - **AVX2**: the same adder tree on 256-bit registers with a nibble-lookup popcount
//! - **AVX-512**: 512-bit logic with native `VPOPCNTQ`
//!
//! Every tier must agree bit-for-bit with [`reference`]; the conformance suite
//! at the bottom of this file runs against each tier the host supports.

pub mod avx2;
pub mod avx512;
pub mod generic;
pub mod reference;

use std::sync::OnceLock;

use crate::hv::Word;

/// Instruction set architecture level detected at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IsaLevel {
    /// Portable Rust, no SIMD intrinsics.
    Generic,
    /// x86_64 AVX2 (256-bit vectors).
    Avx2,
    /// x86_64 AVX-512F with VPOPCNTDQ (512-bit vectors).
    Avx512,
}

impl IsaLevel {
    /// All levels, lowest first.
    pub const ALL: [IsaLevel; 3] = [IsaLevel::Generic, IsaLevel::Avx2, IsaLevel::Avx512];

    /// Whether the current CPU can run this level.
    pub fn is_supported(self) -> bool {
        match self {
            IsaLevel::Generic => true,
            #[cfg(target_arch = "x86_64")]
            IsaLevel::Avx2 => is_x86_feature_detected!("avx2"),
            #[cfg(target_arch = "x86_64")]
            IsaLevel::Avx512 => {
                is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512vpopcntdq")
            }
            #[cfg(not(target_arch = "x86_64"))]
            _ => false,
        }
    }
}

impl std::fmt::Display for IsaLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsaLevel::Generic => write!(f, "Generic (carry-save u64)"),
            IsaLevel::Avx2 => write!(f, "AVX2 (256-bit)"),
            IsaLevel::Avx512 => write!(f, "AVX-512 VPOPCNTDQ (512-bit)"),
        }
    }
}

impl std::str::FromStr for IsaLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(IsaLevel::Generic),
            "avx2" => Ok(IsaLevel::Avx2),
            "avx512" | "avx-512" => Ok(IsaLevel::Avx512),
            other => Err(format!("unknown ISA level '{other}' (expected generic, avx2, avx512)")),
        }
    }
}

/// Detect the best ISA level available on the current CPU.
pub fn detect_isa() -> IsaLevel {
    IsaLevel::ALL
        .into_iter()
        .rev()
        .find(|level| level.is_supported())
        .unwrap_or(IsaLevel::Generic)
}

/// Word-parallel kernels over packed bit slices.
///
/// All slice arguments of one call must have the same length; any length is
/// accepted, so implementations handle tails that do not fill a register.
///
/// # Panics
///
/// Every method panics if its slices differ in length. The check is made once
/// per call, before any word is read or written.
pub trait BitKernel: Send + Sync {
    /// The ISA level this kernel targets.
    fn isa_level(&self) -> IsaLevel;

    /// `out[i] = a[i] & b[i]`
    fn and(&self, a: &[Word], b: &[Word], out: &mut [Word]);

    /// `out[i] = a[i] | b[i]`
    fn or(&self, a: &[Word], b: &[Word], out: &mut [Word]);

    /// `out[i] = a[i] ^ b[i]`
    fn xor(&self, a: &[Word], b: &[Word], out: &mut [Word]);

    /// `out[i] = !a[i]`
    fn invert(&self, a: &[Word], out: &mut [Word]);

    /// Number of set bits in `a`.
    fn active(&self, a: &[Word]) -> u32;

    /// Number of positions where `a` and `b` differ.
    fn hamming(&self, a: &[Word], b: &[Word]) -> u32;
}

/// Return the best available kernel for the current CPU.
pub fn best_kernel() -> Box<dyn BitKernel> {
    kernel_for(detect_isa()).unwrap_or_else(|| Box::new(generic::GenericKernel))
}

/// Return the kernel for a specific level, or `None` if the CPU lacks it.
pub fn kernel_for(level: IsaLevel) -> Option<Box<dyn BitKernel>> {
    match level {
        IsaLevel::Generic => Some(Box::new(generic::GenericKernel)),
        IsaLevel::Avx2 => avx2::Avx2Kernel::new().map(|k| Box::new(k) as Box<dyn BitKernel>),
        IsaLevel::Avx512 => avx512::Avx512Kernel::new().map(|k| Box::new(k) as Box<dyn BitKernel>),
    }
}

/// Kernels for every level the current CPU supports, lowest first.
pub fn available_kernels() -> Vec<Box<dyn BitKernel>> {
    IsaLevel::ALL.into_iter().filter_map(kernel_for).collect()
}

static KERNEL: OnceLock<Box<dyn BitKernel>> = OnceLock::new();

/// The process-wide dispatched kernel.
///
/// Selected on first use and never re-decided.
pub fn kernel() -> &'static dyn BitKernel {
    KERNEL
        .get_or_init(|| {
            let kernel = best_kernel();
            tracing::debug!(
                isa = %kernel.isa_level(),
                bits = crate::hv::BITS,
                "selected bit kernel"
            );
            kernel
        })
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    #[test]
    fn detect_isa_returns_supported_level() {
        let level = detect_isa();
        assert!(level.is_supported());
        assert!(level >= IsaLevel::Generic);
    }

    #[test]
    fn dispatched_kernel_matches_detection() {
        assert_eq!(kernel().isa_level(), detect_isa());
        assert_eq!(best_kernel().isa_level(), detect_isa());
    }

    #[test]
    fn kernel_for_respects_support() {
        for level in IsaLevel::ALL {
            match kernel_for(level) {
                Some(k) => assert_eq!(k.isa_level(), level),
                None => assert!(!level.is_supported()),
            }
        }
        assert!(kernel_for(IsaLevel::Generic).is_some());
    }

    #[test]
    fn isa_level_parses() {
        assert_eq!("AVX2".parse::<IsaLevel>().unwrap(), IsaLevel::Avx2);
        assert_eq!("avx-512".parse::<IsaLevel>().unwrap(), IsaLevel::Avx512);
        assert!("neon".parse::<IsaLevel>().is_err());
    }

    fn random_words(rng: &mut impl Rng, len: usize, density: f64) -> Vec<Word> {
        (0..len)
            .map(|_| {
                (0..64).fold(0u64, |w, bit| {
                    if rng.gen_bool(density) { w | (1 << bit) } else { w }
                })
            })
            .collect()
    }

    /// Run the full kernel test suite against any implementation.
    pub fn kernel_conformance_tests(kernel: &dyn BitKernel) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        // Lengths straddle every tier's block sizes so the tail paths run.
        let lengths = [0, 1, 3, 4, 7, 8, 15, 16, 17, 63, 64, 65, 127, 128, 129, 256, 300, 512];
        let densities = [0.0, 0.001, 0.1, 0.5, 0.9, 0.999, 1.0];

        for &len in &lengths {
            for &density in &densities {
                let a = random_words(&mut rng, len, density);
                let b = random_words(&mut rng, len, 0.5);

                assert_eq!(
                    kernel.active(&a),
                    reference::active(&a),
                    "{}: active mismatch len={len} density={density}",
                    kernel.isa_level()
                );
                assert_eq!(
                    kernel.hamming(&a, &b),
                    reference::hamming(&a, &b),
                    "{}: hamming mismatch len={len} density={density}",
                    kernel.isa_level()
                );

                let mut out = vec![0; len];
                kernel.and(&a, &b, &mut out);
                assert!(out.iter().zip(&a).zip(&b).all(|((&o, &x), &y)| o == x & y));
                kernel.or(&a, &b, &mut out);
                assert!(out.iter().zip(&a).zip(&b).all(|((&o, &x), &y)| o == x | y));
                kernel.xor(&a, &b, &mut out);
                assert!(out.iter().zip(&a).zip(&b).all(|((&o, &x), &y)| o == x ^ y));
                kernel.invert(&a, &mut out);
                assert!(out.iter().zip(&a).all(|(&o, &x)| o == !x));
            }
        }

        // Saturated inputs exercise every carry in the adder tree.
        let ones = vec![Word::MAX; 512];
        let zeros = vec![0; 512];
        assert_eq!(kernel.active(&ones), 512 * 64);
        assert_eq!(kernel.active(&zeros), 0);
        assert_eq!(kernel.hamming(&ones, &zeros), 512 * 64);
        assert_eq!(kernel.hamming(&ones, &ones), 0);
    }

    #[test]
    fn generic_kernel_conformance() {
        kernel_conformance_tests(&generic::GenericKernel);
    }

    #[test]
    fn avx2_kernel_conformance() {
        if let Some(kernel) = kernel_for(IsaLevel::Avx2) {
            kernel_conformance_tests(kernel.as_ref());
        }
    }

    #[test]
    fn avx512_kernel_conformance() {
        if let Some(kernel) = kernel_for(IsaLevel::Avx512) {
            kernel_conformance_tests(kernel.as_ref());
        }
    }

    #[test]
    fn dispatched_kernel_conformance() {
        kernel_conformance_tests(kernel());
    }

    /// Every call with disagreeing slice lengths must panic before touching memory.
    fn assert_rejects_length_mismatch(kernel: &dyn BitKernel) {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        let long = vec![Word::MAX; 64];
        let short = vec![0 as Word; 8];
        let level = kernel.isa_level();

        let calls: [(&str, Box<dyn Fn() + '_>); 6] = [
            ("hamming", Box::new(|| {
                let _ = kernel.hamming(&long, &short);
            })),
            ("and", Box::new(|| kernel.and(&long, &short, &mut vec![0; 64]))),
            ("or", Box::new(|| kernel.or(&long, &long, &mut vec![0; 8]))),
            ("xor", Box::new(|| kernel.xor(&long, &short, &mut vec![0; 64]))),
            ("xor out", Box::new(|| kernel.xor(&long, &long, &mut vec![0; 8]))),
            ("invert", Box::new(|| kernel.invert(&long, &mut vec![0; 8]))),
        ];
        for (name, call) in calls {
            let result = catch_unwind(AssertUnwindSafe(|| call()));
            assert!(result.is_err(), "{level}: {name} accepted mismatched lengths");
        }
    }

    #[test]
    #[should_panic(expected = "operand length mismatch")]
    fn generic_hamming_rejects_short_operand() {
        generic::GenericKernel.hamming(&[Word::MAX; 64], &[0; 8]);
    }

    #[test]
    #[should_panic(expected = "output length mismatch")]
    fn generic_xor_rejects_short_output() {
        generic::GenericKernel.xor(&[1; 64], &[6; 64], &mut [7; 8]);
    }

    #[test]
    fn every_tier_rejects_length_mismatch() {
        for kernel in available_kernels() {
            assert_rejects_length_mismatch(kernel.as_ref());
        }
    }
}
