//! Dedup key computation.
//!
//! The fingerprint is a 32-bit multiplicative fold (`h = h * 31 + unit`,
//! wrapping) over the UTF-16 code units of `"{layer}:{normalized text}"`.
//! It is not cryptographic. Collisions within one owner and layer are
//! accepted as a rare false dedup.

use strata_types::layer::Layer;
use strata_types::memory::Fingerprint;

/// Trim surrounding whitespace and lowercase.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Fold `input` into a 32-bit hash.
pub fn fold_hash(input: &str) -> u32 {
    input
        .encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(u32::from(unit)))
}

/// Dedup key for `text` within `layer`.
pub fn fingerprint(layer: Layer, text: &str) -> Fingerprint {
    Fingerprint(fold_hash(&format!("{}:{}", layer.as_str(), normalize(text))))
}
