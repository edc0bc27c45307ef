//! Hypervector storage.
//!
//! A [`HyperVec`] is exactly [`BITS`] bits, packed LSB-first into [`WORDS`]
//! `u64` words: bit `i` lives in word `i / 64` at position `i % 64`. The
//! width is fixed when the crate is built (see the `dim-8k` / `dim-32k`
//! features), so two hypervectors can never disagree on size.
//!
//! Vectors are 64-byte aligned so that every SIMD tier in [`crate::simd`]
//! loads whole cache lines.

pub mod logic;

use std::fmt;

/// Machine word used for storage and all word-parallel operations.
pub type Word = u64;

/// Bits per storage word.
pub const WORD_BITS: usize = Word::BITS as usize;

/// Number of bits in every hypervector.
#[cfg(feature = "dim-8k")]
pub const BITS: usize = 8_192;

/// Number of bits in every hypervector.
#[cfg(all(feature = "dim-32k", not(feature = "dim-8k")))]
pub const BITS: usize = 32_768;

/// Number of bits in every hypervector.
#[cfg(not(any(feature = "dim-8k", feature = "dim-32k")))]
pub const BITS: usize = 16_384;

/// Number of storage words per hypervector.
pub const WORDS: usize = BITS / WORD_BITS;

/// Number of bytes per hypervector.
pub const BYTES: usize = WORDS * std::mem::size_of::<Word>();

/// Words per 64-byte cache line.
pub const LINE_WORDS: usize = 64 / std::mem::size_of::<Word>();

const _: () = assert!(BITS % WORD_BITS == 0);
const _: () = assert!(WORDS % LINE_WORDS == 0);

/// A fixed-width binary hypervector.
#[derive(Clone, PartialEq, Eq, Hash)]
#[repr(C, align(64))]
pub struct HyperVec {
    words: [Word; WORDS],
}

impl HyperVec {
    /// The all-zero vector.
    pub const ZERO: Self = Self { words: [0; WORDS] };

    /// The all-one vector.
    pub const ONE: Self = Self {
        words: [Word::MAX; WORDS],
    };

    /// Wrap raw words.
    pub const fn from_words(words: [Word; WORDS]) -> Self {
        Self { words }
    }

    /// Raw words of this hypervector.
    pub fn words(&self) -> &[Word; WORDS] {
        &self.words
    }

    /// Mutable raw words.
    pub fn words_mut(&mut self) -> &mut [Word; WORDS] {
        &mut self.words
    }

    /// Read bit `index`.
    pub fn get_bit(&self, index: usize) -> bool {
        assert!(index < BITS, "bit index {index} out of range for {BITS}-bit vector");
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    /// Set bit `index` to `value`.
    pub fn set_bit(&mut self, index: usize, value: bool) {
        assert!(index < BITS, "bit index {index} out of range for {BITS}-bit vector");
        let mask = 1 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Overwrite this vector with the contents of `src`.
    pub fn copy_from(&mut self, src: &HyperVec) {
        self.words.copy_from_slice(&src.words);
    }

    /// Reset every bit to zero.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Number of set bits, using the dispatched kernel.
    pub fn active(&self) -> u32 {
        crate::metrics::active(self)
    }
}

impl Default for HyperVec {
    fn default() -> Self {
        Self::ZERO
    }
}

impl AsRef<HyperVec> for HyperVec {
    fn as_ref(&self) -> &HyperVec {
        self
    }
}

impl fmt::Debug for HyperVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperVec")
            .field("bits", &BITS)
            .field("active", &crate::simd::reference::active(&self.words))
            .field("head", &format_args!("{:#018x}", self.words[0]))
            .finish()
    }
}

/// Allocate a hypervector owned by the caller.
///
/// The content is unspecified by contract; callers must overwrite it before
/// reading. Allocation failure aborts the process.
pub fn allocate() -> Box<HyperVec> {
    empty()
}

/// Allocate an all-zero hypervector owned by the caller.
pub fn empty() -> Box<HyperVec> {
    Box::new(HyperVec::ZERO)
}

/// Release a caller-owned hypervector.
///
/// Taking the box by value makes double release and use-after-release
/// compile errors.
pub fn release(v: Box<HyperVec>) {
    drop(v);
}
