use crate::constants::*;
use crate::errors::PrivacyPoolError;
use crate::events;
use crate::state::*;
use crate::transfer::{NativeVault, PoolVault, TokenVault};
use crate::verifier::Groth16Verifier;
use crate::withdrawal::{CallContext, WithdrawRequest, Withdrawal};
use anchor_lang::prelude::*;
use anchor_spl::token::{Token, TokenAccount};

#[derive(Accounts)]
#[instruction(request: WithdrawRequest)]
pub struct Withdraw<'info> {
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

    /// RootRecord PDA of `request.proof.root`; anything else reads as an unknown root
    /// CHECK: address, owner and contents are checked by RootRecordLookup
    pub root_record: UncheckedAccount<'info>,

    #[account(
        init_if_needed,
        payer = relayer,
        space = SpentNullifier::LEN,
        seeds = [NULLIFIER_SEED, pool.key().as_ref(), request.proof.nullifier.as_ref()],
        bump
    )]
    pub nullifier_record: Account<'info, SpentNullifier>,

    /// CHECK: address fixed by seeds; holds lamports or is the pool token account
    #[account(
        mut,
        seeds = [VAULT_SEED, pool.key().as_ref()],
        bump = pool.vault_bump
    )]
    pub vault: UncheckedAccount<'info>,

    /// Receives lamport payouts and any refund
    /// CHECK: matched against the proof's recipient when paying out
    #[account(mut)]
    pub recipient: UncheckedAccount<'info>,

    /// CHECK: matched against the request's fee receiver when paying out
    #[account(mut)]
    pub fee_receiver: Option<UncheckedAccount<'info>>,

    /// Recipient's token account for token pools
    #[account(mut)]
    pub recipient_token: Option<Account<'info, TokenAccount>>,

    /// Fee receiver's token account for token pools
    #[account(mut)]
    pub fee_receiver_token: Option<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub relayer: Signer<'info>,

    pub token_program: Option<Program<'info, Token>>,

    pub system_program: Program<'info, System>,
}

impl<'info> Withdraw<'info> {
    fn destinations(&self) -> Vec<AccountInfo<'info>> {
        let mut destinations = vec![self.recipient.to_account_info()];
        if let Some(fee_receiver) = &self.fee_receiver {
            destinations.push(fee_receiver.to_account_info());
        }
        if let Some(recipient_token) = &self.recipient_token {
            destinations.push(recipient_token.to_account_info());
        }
        if let Some(fee_receiver_token) = &self.fee_receiver_token {
            destinations.push(fee_receiver_token.to_account_info());
        }
        destinations
    }

    fn pool_vault(&self) -> Result<PoolVault<'info>> {
        let pool = &self.pool;
        match pool.kind {
            AssetKind::Native => Ok(PoolVault::Native(NativeVault {
                pool: pool.key(),
                vault: self.vault.to_account_info(),
                vault_bump: pool.vault_bump,
                payer: self.relayer.to_account_info(),
                destinations: self.destinations(),
                system_program: self.system_program.to_account_info(),
            })),
            AssetKind::Token => {
                let token_program = self
                    .token_program
                    .as_ref()
                    .ok_or_else(|| error!(PrivacyPoolError::MissingAssetAccounts))?;

                Ok(PoolVault::Token(TokenVault {
                    mint: pool.asset,
                    denomination: pool.denomination,
                    pool: pool.to_account_info(),
                    pool_bump: pool.bump,
                    vault: self.vault.to_account_info(),
                    payer: self.relayer.to_account_info(),
                    payer_token: None,
                    destinations: self.destinations(),
                    token_program: token_program.to_account_info(),
                    system_program: self.system_program.to_account_info(),
                }))
            }
        }
    }
}

/// `value` is the lamports the relayer attaches for the recipient; it must
/// equal the proof's refund on token pools and be zero on lamport pools.
pub fn withdraw(ctx: Context<Withdraw>, request: WithdrawRequest, value: u64) -> Result<()> {
    let accounts = ctx.accounts;
    let terms = accounts.pool.terms();
    let pool_key = accounts.pool.key();
    let now = Clock::get()?.unix_timestamp;

    let call = CallContext {
        caller: accounts.relayer.key(),
        now,
        attached_value: value,
    };

    let roots = RootRecordLookup {
        pool: pool_key,
        account: &accounts.root_record.to_account_info(),
    };

    let validated =
        Withdrawal::new(request).validate(&terms, &call, &roots, &*accounts.nullifier_record)?;

    let verifier = Groth16Verifier::from_account(&accounts.vk_account, &accounts.pool.vk_hash)?;
    let checked = validated.check_proof(&terms, &verifier)?;

    let mut vault = accounts.pool_vault()?;
    let settled = checked.settle(&terms, &mut *accounts.nullifier_record, &mut vault)?;

    let nullifier_record = &mut accounts.nullifier_record;
    nullifier_record.pool = pool_key;
    nullifier_record.spent_at = now;
    nullifier_record.bump = ctx.bumps.nullifier_record;

    let record = settled.into_record();

    msg!(
        "Withdrawal paid {} to recipient, fee {}",
        record.recipient_amount,
        record.fee_amount
    );

    emit!(events::Withdrawal {
        pool: pool_key,
        recipient: record.recipient,
        relayer: record.relayer,
        subset_root: record.subset_root,
        nullifier: record.nullifier,
        fee: record.fee,
        timestamp: now,
    });

    Ok(())
}
