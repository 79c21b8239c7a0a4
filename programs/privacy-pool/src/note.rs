//! Deposit notes and the hashes derived from them.
//!
//! raw_commitment = H(secret)
//! commitment     = H(raw_commitment, asset_metadata)
//! nullifier      = H(secret, NULLIFIER_DOMAIN_TAG, leaf_index)

use anchor_lang::prelude::*;

use crate::constants::NULLIFIER_DOMAIN_TAG;
use crate::field::{from_u64, hash_to_field, reduce};
use crate::hasher::FieldHasher;

/// Binds a pool to its asset and denomination: hash_to_field(asset ‖ denomination_be)
pub fn asset_metadata(asset: &Pubkey, denomination: u64) -> [u8; 32] {
    hash_to_field(&[asset.as_ref(), &denomination.to_be_bytes()])
}

/// Leaf inserted into the commitment tree for a deposit.
pub fn commitment<H: FieldHasher>(
    hasher: &H,
    raw_commitment: &[u8; 32],
    asset_metadata: &[u8; 32],
) -> Result<[u8; 32]> {
    hasher.hash_pair(raw_commitment, asset_metadata)
}

/// Depositor-held secret. Only `raw_commitment` is ever published at deposit
/// time; the nullifier is revealed once at withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    secret: [u8; 32],
}

impl Note {
    pub fn new(secret: [u8; 32]) -> Self {
        Self {
            secret: reduce(secret),
        }
    }

    pub fn secret(&self) -> &[u8; 32] {
        &self.secret
    }

    pub fn raw_commitment<H: FieldHasher>(&self, hasher: &H) -> Result<[u8; 32]> {
        hasher.hash(&[self.secret])
    }

    pub fn commitment<H: FieldHasher>(
        &self,
        hasher: &H,
        asset_metadata: &[u8; 32],
    ) -> Result<[u8; 32]> {
        commitment(hasher, &self.raw_commitment(hasher)?, asset_metadata)
    }

    pub fn nullifier<H: FieldHasher>(&self, hasher: &H, leaf_index: u64) -> Result<[u8; 32]> {
        hasher.hash(&[
            self.secret,
            from_u64(NULLIFIER_DOMAIN_TAG),
            from_u64(leaf_index),
        ])
    }
}
