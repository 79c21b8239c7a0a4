use crate::constants::*;
use crate::errors::PrivacyPoolError;
use crate::events::Deposit;
use crate::hasher::POOL_HASHER;
use crate::pool::deposit_commitments;
use crate::state::*;
use crate::transfer::{NativeVault, PoolVault, TokenVault};
use anchor_lang::prelude::*;
use anchor_spl::token::{Token, TokenAccount};

/// Shared by `deposit` and `deposit_many`. `new_root` is the root the tree
/// will have once every commitment of the call is inserted.
#[derive(Accounts)]
#[instruction(new_root: [u8; 32])]
pub struct DepositCommitments<'info> {
    #[account(
        seeds = [POOL_SEED, pool.asset.as_ref(), &pool.denomination.to_le_bytes()],
        bump = pool.bump
    )]
    pub pool: Account<'info, PoolConfig>,

    #[account(
        mut,
        seeds = [TREE_SEED, pool.key().as_ref()],
        bump
    )]
    pub tree: AccountLoader<'info, CommitmentTreeAccount>,

    #[account(
        init,
        payer = depositor,
        space = RootRecord::LEN,
        seeds = [ROOT_SEED, pool.key().as_ref(), new_root.as_ref()],
        bump
    )]
    pub root_record: Account<'info, RootRecord>,

    /// CHECK: address fixed by seeds; holds lamports or is the pool token account
    #[account(
        mut,
        seeds = [VAULT_SEED, pool.key().as_ref()],
        bump = pool.vault_bump
    )]
    pub vault: UncheckedAccount<'info>,

    #[account(mut)]
    pub depositor: Signer<'info>,

    /// Source of the tokens for token pools
    #[account(mut)]
    pub depositor_token: Option<Account<'info, TokenAccount>>,

    pub token_program: Option<Program<'info, Token>>,

    pub system_program: Program<'info, System>,
}

impl<'info> DepositCommitments<'info> {
    fn pool_vault(&self) -> Result<PoolVault<'info>> {
        let pool = &self.pool;
        match pool.kind {
            AssetKind::Native => Ok(PoolVault::Native(NativeVault {
                pool: pool.key(),
                vault: self.vault.to_account_info(),
                vault_bump: pool.vault_bump,
                payer: self.depositor.to_account_info(),
                destinations: Vec::new(),
                system_program: self.system_program.to_account_info(),
            })),
            AssetKind::Token => {
                let depositor_token = self
                    .depositor_token
                    .as_ref()
                    .ok_or_else(|| error!(PrivacyPoolError::MissingAssetAccounts))?;
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
                    payer: self.depositor.to_account_info(),
                    payer_token: Some(depositor_token.to_account_info()),
                    destinations: Vec::new(),
                    token_program: token_program.to_account_info(),
                    system_program: self.system_program.to_account_info(),
                }))
            }
        }
    }
}

pub fn deposit(
    ctx: Context<DepositCommitments>,
    new_root: [u8; 32],
    raw_commitment: [u8; 32],
) -> Result<()> {
    deposit_batch(ctx, new_root, &[raw_commitment])
}

pub fn deposit_many(
    ctx: Context<DepositCommitments>,
    new_root: [u8; 32],
    raw_commitments: Vec<[u8; 32]>,
) -> Result<()> {
    deposit_batch(ctx, new_root, &raw_commitments)
}

fn deposit_batch(
    ctx: Context<DepositCommitments>,
    new_root: [u8; 32],
    raw_commitments: &[[u8; 32]],
) -> Result<()> {
    let accounts = ctx.accounts;
    let mut vault = accounts.pool_vault()?;
    let terms = accounts.pool.terms();
    let pool_key = accounts.pool.key();
    let depositor = accounts.depositor.key();

    let records = {
        let mut tree_account = accounts.tree.load_mut()?;
        let leaf_count = tree_account
            .tree
            .next_index
            .checked_add(raw_commitments.len() as u64)
            .ok_or_else(|| error!(PrivacyPoolError::ArithmeticOverflow))?;

        let mut recorder = RootRecorder {
            record: &mut accounts.root_record,
            pool: pool_key,
            expected_root: new_root,
            leaf_count,
            bump: ctx.bumps.root_record,
        };

        deposit_commitments(
            &POOL_HASHER,
            &mut tree_account.tree,
            &terms,
            &depositor,
            raw_commitments,
            &mut recorder,
            &mut vault,
        )?
    };

    msg!(
        "Deposited {} commitment(s), first leaf {}",
        records.len(),
        records.first().map(|record| record.leaf_index).unwrap_or_default()
    );

    let timestamp = Clock::get()?.unix_timestamp;
    for record in records {
        emit!(Deposit {
            pool: pool_key,
            raw_commitment: record.raw_commitment,
            commitment: record.commitment,
            asset: record.asset,
            denomination: record.denomination,
            leaf_index: record.leaf_index,
            timestamp,
        });
    }

    Ok(())
}
