//! Canonical hashing of serializable payloads.

use rgf_core::errors::RgfError;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::serde::to_canonical_json_bytes;

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, RgfError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}

/// Converts a hexadecimal hash string into a deterministic seed.
pub fn seed_from_hash(hash: &str) -> u64 {
    let mut acc: u64 = 0;
    for chunk in hash.as_bytes().chunks(8) {
        let mut value: u64 = 0;
        for &byte in chunk {
            let digit = match byte {
                b'0'..=b'9' => (byte - b'0') as u64,
                b'a'..=b'f' => (byte - b'a' + 10) as u64,
                b'A'..=b'F' => (byte - b'A' + 10) as u64,
                _ => 0,
            };
            value = (value << 4) | digit;
        }
        acc ^= value;
    }
    acc
}

/// Rounds a floating point value to the canonical hashing precision.
pub fn round_f64(value: f64) -> f64 {
    let scaled = (value * 1e9).round();
    scaled / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_field_order_independent() {
        use std::collections::BTreeMap;
        let mut a = BTreeMap::new();
        a.insert("x", 1);
        a.insert("y", 2);
        let h1 = stable_hash_string(&a).unwrap();
        let mut b = BTreeMap::new();
        b.insert("y", 2);
        b.insert("x", 1);
        let h2 = stable_hash_string(&b).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn seed_from_hash_is_stable() {
        let seed = seed_from_hash("00000000000000ff");
        assert_eq!(seed, 0xff);
    }

    #[test]
    fn rounding_clips_noise_below_nano() {
        assert_eq!(round_f64(1.000_000_000_4), 1.0);
        assert!(round_f64(1.000_000_001_6) > 1.0);
    }
}
