//! Algebraic hash used by the trees, commitments and nullifiers.
//!
//! The hash must match the proving circuit bit-for-bit: circom Poseidon over
//! BN254 (x^5 S-box, big-endian encoding). On-chain it runs through the
//! `sol_poseidon` syscall; off-chain `solana-poseidon` falls back to
//! `light-poseidon` with the same parameters.

use anchor_lang::prelude::*;
use solana_poseidon::{hashv, Endianness, Parameters};

use crate::constants::MAX_POSEIDON_INPUTS;
use crate::errors::PrivacyPoolError;
use crate::field::is_canonical;

pub trait FieldHasher {
    /// Hash a short sequence of field elements into one field element.
    fn hash(&self, inputs: &[[u8; 32]]) -> Result<[u8; 32]>;

    /// Two-to-one compression used by the Merkle trees.
    fn hash_pair(&self, left: &[u8; 32], right: &[u8; 32]) -> Result<[u8; 32]> {
        self.hash(&[*left, *right])
    }
}

/// Circom-compatible Poseidon, one permutation width per input count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoseidonHasher;

impl FieldHasher for PoseidonHasher {
    fn hash(&self, inputs: &[[u8; 32]]) -> Result<[u8; 32]> {
        require!(
            !inputs.is_empty() && inputs.len() <= MAX_POSEIDON_INPUTS,
            PrivacyPoolError::HashFailed
        );
        require!(
            inputs.iter().all(is_canonical),
            PrivacyPoolError::FieldElementNotCanonical
        );

        let parts: Vec<&[u8]> = inputs.iter().map(|input| input.as_slice()).collect();
        let digest = hashv(Parameters::Bn254X5, Endianness::BigEndian, &parts)
            .map_err(|_| error!(PrivacyPoolError::HashFailed))?;

        Ok(digest.to_bytes())
    }
}

/// Hasher used by the on-chain instructions
pub const POOL_HASHER: PoseidonHasher = PoseidonHasher;
