//! K-mer length validation and small packed-k-mer helpers shared by the
//! table and correction engine.

use crate::error::KmerLengthError;
use crate::packed::Base;

/// Minimum supported k-mer length.
pub const MIN_K: u8 = 4;
/// Maximum supported k-mer length (gapped/variable-length k-mers are out of
/// scope; everything here assumes a single fixed k that fits in a `u64`).
pub const MAX_K: u8 = 31;

/// A validated k-mer length in `[4, 31]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KmerLength(u8);

impl KmerLength {
    /// Validates and wraps a k-mer length.
    ///
    /// # Errors
    ///
    /// Returns [`KmerLengthError`] if `k` is outside `[4, 31]`.
    pub fn new(k: usize) -> Result<Self, KmerLengthError> {
        if (usize::from(MIN_K)..=usize::from(MAX_K)).contains(&k) {
            Ok(Self(k as u8))
        } else {
            Err(KmerLengthError {
                k,
                min: MIN_K,
                max: MAX_K,
            })
        }
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// Unpacks a top-aligned packed k-mer back into a base string, for display
/// and for FASTK/debug output.
#[must_use]
pub fn unpack_to_string(packed: u64, k: KmerLength) -> String {
    let k = k.get();
    (0..k)
        .map(|i| {
            let shift = 64 - 2 * (i + 1);
            Base::from_bits(packed >> shift).to_ascii() as char
        })
        .collect()
}
