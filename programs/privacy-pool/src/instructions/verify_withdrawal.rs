use crate::constants::*;
use crate::state::*;
use crate::verifier::Groth16Verifier;
use crate::withdrawal::{proof_is_valid, WithdrawalProof};
use anchor_lang::prelude::*;

#[derive(Accounts)]
pub struct VerifyWithdrawal<'info> {
    #[account(
        seeds = [POOL_SEED, pool.asset.as_ref(), &pool.denomination.to_le_bytes()],
        bump = pool.bump
    )]
    pub pool: Account<'info, PoolConfig>,

    #[account(
        seeds = [VK_SEED, pool.key().as_ref()],
        bump = vk_account.bump
    )]
    pub vk_account: Account<'info, VerificationKeyAccount>,
}

/// Check a withdrawal proof against the pool's key without touching state.
pub fn verify_withdrawal(ctx: Context<VerifyWithdrawal>, proof: WithdrawalProof) -> Result<bool> {
    let pool = &ctx.accounts.pool;
    let verifier = Groth16Verifier::from_account(&ctx.accounts.vk_account, &pool.vk_hash)?;

    proof_is_valid(&proof, &pool.asset_metadata, &verifier)
}
