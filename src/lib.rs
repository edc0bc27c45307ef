// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # hyperbits
//!
//! A fixed-width binary hypervector algebra engine: dense bit vectors of a
//! build-time width (16,384 bits by default) with bitwise logic, population
//! counts, bit-sliced majority voting, density-controlled random generation,
//! and invertible cyclic permutation.
//!
//! ## Architecture
//!
//! - **Vectors** (`hv`): the cache-line aligned [`HyperVec`] value type and its logic
//! - **SIMD acceleration** (`simd`): runtime-dispatched AVX-512/AVX2/generic kernels
//! - **Metrics** (`metrics`): active count, Hamming distance, similarity
//! - **Voting** (`vote`): bit-sliced threshold and majority over many inputs
//! - **Generation** (`random`): uniform, power-of-two and arbitrary-density sampling
//! - **Permutation** (`permute`): exact-inverse cyclic bit shifts
//! - **Harness** (`harness`, `config`): timing and cross-checking for `hvbench`
//!
//! ## Library usage
//!
//! ```
//! use hyperbits::random::{HvRng, random_density};
//! use hyperbits::{metrics, permute, vote};
//!
//! let mut rng = HvRng::seeded(7);
//! let items: Vec<_> = (0..5).map(|_| random_density(&mut rng, 0.5)).collect();
//! let bundle = vote::majority(&items);
//! assert!(metrics::similarity(&bundle, &items[0]) > 0.6);
//!
//! let shifted = permute::permute(&items[0], 3);
//! assert_eq!(*permute::permute(&shifted, -3), *items[0]);
//! ```

pub mod config;
pub mod error;
pub mod harness;
pub mod hv;
pub mod metrics;
pub mod permute;
pub mod random;
pub mod simd;
pub mod vote;

pub use hv::{BITS, HyperVec, WORDS};
