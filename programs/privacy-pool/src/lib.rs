use anchor_lang::prelude::*;

pub mod access_list;
pub mod constants;
pub mod errors;
pub mod events;
pub mod field;
pub mod hasher;
pub mod instructions;
pub mod leaf_tree;
pub mod merkle;
pub mod note;
pub mod nullifier;
pub mod pool;
pub mod state;
pub mod transfer;
pub mod verifier;
pub mod withdrawal;

#[cfg(test)]
mod testing;

use instructions::*;
use withdrawal::{WithdrawRequest, WithdrawalProof};

declare_id!("Hza5rjYmJnoYsjsgsuxLkyxLoWVo6RCUZxCB3x17v8qz");

#[program]
pub mod privacy_pool {
    use super::*;

    /// Create a fixed-denomination pool for `asset` with an empty commitment tree
    pub fn initialize_pool(
        ctx: Context<InitializePool>,
        asset: Pubkey,
        denomination: u64,
        merkle_depth: u8,
        empty_root: [u8; 32],
    ) -> Result<()> {
        instructions::initialize_pool(ctx, asset, denomination, merkle_depth, empty_root)
    }

    /// Set or replace the withdrawal verification key (admin only)
    pub fn set_verification_key(
        ctx: Context<SetVerificationKey>,
        vk_data: Vec<u8>,
        vk_hash: [u8; 32],
    ) -> Result<()> {
        instructions::set_verification_key(ctx, vk_data, vk_hash)
    }

    /// Deposit one denomination and insert its commitment
    pub fn deposit(
        ctx: Context<DepositCommitments>,
        new_root: [u8; 32],
        raw_commitment: [u8; 32],
    ) -> Result<()> {
        instructions::deposit(ctx, new_root, raw_commitment)
    }

    /// Deposit one denomination per commitment in a single insertion
    pub fn deposit_many(
        ctx: Context<DepositCommitments>,
        new_root: [u8; 32],
        raw_commitments: Vec<[u8; 32]>,
    ) -> Result<()> {
        instructions::deposit_many(ctx, new_root, raw_commitments)
    }

    /// Spend a note through a relayer
    pub fn withdraw(ctx: Context<Withdraw>, request: WithdrawRequest, value: u64) -> Result<()> {
        instructions::withdraw(ctx, request, value)
    }

    /// Check a withdrawal proof without spending anything
    pub fn verify_withdrawal(ctx: Context<VerifyWithdrawal>, proof: WithdrawalProof) -> Result<bool> {
        instructions::verify_withdrawal(ctx, proof)
    }
}
