//! BN254 scalar field helpers over 32-byte big-endian encodings.
//!
//! Everything the circuit consumes as a public signal must be a canonical
//! field element (`< r`). Byte-oriented values (asset metadata, withdrawal
//! metadata, domain seeds) are mapped into the field with [`hash_to_field`].

use crate::constants::BN254_SCALAR_MODULUS;
use sha2::{Digest, Sha256};

/// Returns true when `value` is strictly below the scalar modulus.
pub fn is_canonical(value: &[u8; 32]) -> bool {
    *value < BN254_SCALAR_MODULUS
}

/// Reduce a 256-bit big-endian integer modulo `r`.
///
/// 2^256 / r < 6, so at most five subtractions are needed.
pub fn reduce(mut value: [u8; 32]) -> [u8; 32] {
    while value >= BN254_SCALAR_MODULUS {
        value = sub_be(&value, &BN254_SCALAR_MODULUS);
    }
    value
}

/// SHA-256 over the concatenated parts, reduced into the scalar field.
pub fn hash_to_field(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    reduce(hasher.finalize().into())
}

/// Embed a u64 as a field element (big-endian, left-padded).
pub fn from_u64(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// `a - b` over 256-bit big-endian integers. Caller guarantees `a >= b`.
pub(crate) fn sub_be(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut borrow = 0i16;
    for i in (0..32).rev() {
        let mut diff = a[i] as i16 - b[i] as i16 - borrow;
        if diff < 0 {
            diff += 256;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out[i] = diff as u8;
    }
    out
}
