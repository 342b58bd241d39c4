//! Deterministic buffer generators shared by the test modules.

use crate::types::packed::WORD_LANES;

/// A packed buffer of `n` words with a formulaic, seed-dependent byte
/// pattern covering the full i8 range.
pub(crate) fn pattern_words(n: usize, seed: usize) -> Vec<u32> {
    (0..n)
        .map(|w| {
            let mut bytes = [0u8; WORD_LANES];
            for (l, b) in bytes.iter_mut().enumerate() {
                *b = ((w * WORD_LANES + l) * 31 + seed * 17 + 7) as u8;
            }
            u32::from_le_bytes(bytes)
        })
        .collect()
}

/// A packed buffer of `n` copies of `word`.
pub(crate) fn words(n: usize, word: u32) -> Vec<u32> {
    vec![word; n]
}
