use crate::constants::*;
use crate::errors::PrivacyPoolError;
use crate::events::PoolInitialized;
use crate::hasher::POOL_HASHER;
use crate::merkle::RootSink;
use crate::pool::PoolParams;
use crate::state::*;
use anchor_lang::prelude::*;
use anchor_lang::system_program;
use anchor_spl::token::{self, Mint, Token, TokenAccount};

#[derive(Accounts)]
#[instruction(asset: Pubkey, denomination: u64, merkle_depth: u8, empty_root: [u8; 32])]
pub struct InitializePool<'info> {
    #[account(
        init,
        payer = admin,
        space = PoolConfig::LEN,
        seeds = [POOL_SEED, asset.as_ref(), &denomination.to_le_bytes()],
        bump
    )]
    pub pool: Account<'info, PoolConfig>,

    #[account(
        init,
        payer = admin,
        space = CommitmentTreeAccount::LEN,
        seeds = [TREE_SEED, pool.key().as_ref()],
        bump
    )]
    pub tree: AccountLoader<'info, CommitmentTreeAccount>,

    #[account(
        init,
        payer = admin,
        space = VerificationKeyAccount::space_for(WITHDRAW_PUBLIC_INPUTS),
        seeds = [VK_SEED, pool.key().as_ref()],
        bump
    )]
    pub vk_account: Account<'info, VerificationKeyAccount>,

    /// Record of the empty-tree root; the client derives it from `empty_root`
    #[account(
        init,
        payer = admin,
        space = RootRecord::LEN,
        seeds = [ROOT_SEED, pool.key().as_ref(), empty_root.as_ref()],
        bump
    )]
    pub root_record: Account<'info, RootRecord>,

    /// Vault PDA: funded as a system account for lamport pools, created as a
    /// token account owned by `pool` for token pools
    /// CHECK: address fixed by seeds; initialized below
    #[account(
        mut,
        seeds = [VAULT_SEED, pool.key().as_ref()],
        bump
    )]
    pub vault: UncheckedAccount<'info>,

    /// Present for token pools only
    pub mint: Option<Account<'info, Mint>>,

    #[account(mut)]
    pub admin: Signer<'info>,

    pub token_program: Option<Program<'info, Token>>,

    pub system_program: Program<'info, System>,
}

pub fn initialize_pool(
    ctx: Context<InitializePool>,
    asset: Pubkey,
    denomination: u64,
    merkle_depth: u8,
    empty_root: [u8; 32],
) -> Result<()> {
    let kind = if ctx.accounts.mint.is_some() {
        AssetKind::Token
    } else {
        AssetKind::Native
    };
    let params = PoolParams {
        asset,
        kind,
        denomination,
        merkle_depth,
    };
    params.validate()?;

    match &ctx.accounts.mint {
        Some(mint) => require_keys_eq!(mint.key(), asset, PrivacyPoolError::AssetMismatch),
        None => require_keys_eq!(asset, NATIVE_ASSET, PrivacyPoolError::AssetMismatch),
    }

    let pool_key = ctx.accounts.pool.key();

    // Empty commitment tree; its root must be the one the record was derived from
    let root = {
        let mut tree_account = ctx.accounts.tree.load_init()?;
        tree_account.pool = pool_key;
        tree_account
            .tree
            .initialize(&POOL_HASHER, merkle_depth, COMMITMENT_TREE_SEED)?;
        tree_account.tree.root
    };

    let mut recorder = RootRecorder {
        record: &mut ctx.accounts.root_record,
        pool: pool_key,
        expected_root: empty_root,
        leaf_count: 0,
        bump: ctx.bumps.root_record,
    };
    recorder.record_root(root)?;

    init_vault(&ctx, kind)?;

    let vk_account = &mut ctx.accounts.vk_account;
    vk_account.pool = pool_key;
    vk_account.n_public = WITHDRAW_PUBLIC_INPUTS as u32;
    vk_account.vk_data = Vec::new();
    vk_account.vk_hash = [0u8; 32];
    vk_account.bump = ctx.bumps.vk_account;

    let pool = &mut ctx.accounts.pool;
    pool.admin = ctx.accounts.admin.key();
    pool.asset = asset;
    pool.kind = kind;
    pool.denomination = denomination;
    pool.merkle_depth = merkle_depth;
    pool.asset_metadata = params.terms().asset_metadata;
    pool.vk_hash = [0u8; 32];
    pool.bump = ctx.bumps.pool;
    pool.vault_bump = ctx.bumps.vault;

    msg!(
        "Pool initialized: denomination {}, depth {}",
        denomination,
        merkle_depth
    );

    emit!(PoolInitialized {
        pool: pool_key,
        admin: pool.admin,
        asset,
        denomination,
        merkle_depth,
        empty_root,
        timestamp: Clock::get()?.unix_timestamp,
    });

    Ok(())
}

fn init_vault(ctx: &Context<InitializePool>, kind: AssetKind) -> Result<()> {
    let accounts = &ctx.accounts;
    let rent = Rent::get()?;

    match kind {
        AssetKind::Native => {
            // Keep the vault rent-exempt so payouts can drain it to the reserve
            let reserve = rent
                .minimum_balance(0)
                .saturating_sub(accounts.vault.lamports());
            if reserve > 0 {
                system_program::transfer(
                    CpiContext::new(
                        accounts.system_program.to_account_info(),
                        system_program::Transfer {
                            from: accounts.admin.to_account_info(),
                            to: accounts.vault.to_account_info(),
                        },
                    ),
                    reserve,
                )?;
            }
        }
        AssetKind::Token => {
            let mint = accounts
                .mint
                .as_ref()
                .ok_or_else(|| error!(PrivacyPoolError::MissingAssetAccounts))?;
            let token_program = accounts
                .token_program
                .as_ref()
                .ok_or_else(|| error!(PrivacyPoolError::MissingAssetAccounts))?;

            let pool_key = accounts.pool.key();
            let bump = [ctx.bumps.vault];
            let vault_seeds: &[&[u8]] = &[VAULT_SEED, pool_key.as_ref(), &bump];

            system_program::create_account(
                CpiContext::new_with_signer(
                    accounts.system_program.to_account_info(),
                    system_program::CreateAccount {
                        from: accounts.admin.to_account_info(),
                        to: accounts.vault.to_account_info(),
                    },
                    &[vault_seeds],
                ),
                rent.minimum_balance(TokenAccount::LEN),
                TokenAccount::LEN as u64,
                &token::ID,
            )?;

            token::initialize_account3(CpiContext::new(
                token_program.to_account_info(),
                token::InitializeAccount3 {
                    account: accounts.vault.to_account_info(),
                    mint: mint.to_account_info(),
                    authority: accounts.pool.to_account_info(),
                },
            ))?;
        }
    }

    Ok(())
}
