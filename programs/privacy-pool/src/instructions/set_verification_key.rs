use crate::constants::*;
use crate::errors::PrivacyPoolError;
use crate::events::VerificationKeySet;
use crate::state::*;
use crate::verifier::Groth16Verifier;
use anchor_lang::prelude::*;
use sha2::{Digest, Sha256};

#[derive(Accounts)]
pub struct SetVerificationKey<'info> {
    #[account(
        mut,
        seeds = [POOL_SEED, pool.asset.as_ref(), &pool.denomination.to_le_bytes()],
        bump = pool.bump,
        has_one = admin @ PrivacyPoolError::Unauthorized
    )]
    pub pool: Account<'info, PoolConfig>,

    /// VK account is created with room for the withdrawal key by initialize_pool
    #[account(
        mut,
        seeds = [VK_SEED, pool.key().as_ref()],
        bump = vk_account.bump
    )]
    pub vk_account: Account<'info, VerificationKeyAccount>,

    pub admin: Signer<'info>,
}

pub fn set_verification_key(
    ctx: Context<SetVerificationKey>,
    vk_data: Vec<u8>,
    vk_hash: [u8; 32],
) -> Result<()> {
    let expected_len = VerificationKeyAccount::vk_data_len(WITHDRAW_PUBLIC_INPUTS);
    require!(
        vk_data.len() == expected_len,
        PrivacyPoolError::InvalidVkData
    );

    let computed_hash = Sha256::digest(&vk_data);
    require!(
        computed_hash.as_slice() == vk_hash,
        PrivacyPoolError::VkHashMismatch
    );

    // Reject degenerate keys before they can gate withdrawals
    Groth16Verifier::new(&vk_data)?;

    let vk_account = &mut ctx.accounts.vk_account;
    vk_account.n_public = WITHDRAW_PUBLIC_INPUTS as u32;
    vk_account.vk_data = vk_data;
    vk_account.vk_hash = vk_hash;

    let pool = &mut ctx.accounts.pool;
    pool.vk_hash = vk_hash;

    emit!(VerificationKeySet {
        pool: pool.key(),
        vk_hash,
        timestamp: Clock::get()?.unix_timestamp,
    });

    Ok(())
}
