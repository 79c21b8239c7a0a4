//! Asset movement between users and the pool vault.
//!
//! Destinations are resolved from the accounts handed to the instruction:
//! lamports go to the account whose key is the destination, tokens go to a
//! token account of the pool mint owned by the destination. A missing
//! destination fails the transfer.
//!
//! Withdrawal payouts go through [`AssetTransfer::pay_all`], which checks
//! every leg before the first one moves.

use anchor_lang::prelude::*;
use anchor_lang::system_program;
use anchor_spl::token::{self, TokenAccount};

use crate::constants::{POOL_SEED, VAULT_SEED};
use crate::errors::PrivacyPoolError;

/// Where a payout leg is paid from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutSource {
    /// Pool asset held by the vault
    Vault,
    /// Lamports attached by the caller
    Caller,
}

/// One leg of a withdrawal payout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub to: Pubkey,
    pub amount: u64,
    pub source: PayoutSource,
}

impl Payout {
    pub fn from_vault(to: Pubkey, amount: u64) -> Self {
        Self {
            to,
            amount,
            source: PayoutSource::Vault,
        }
    }

    pub fn from_caller(to: Pubkey, amount: u64) -> Self {
        Self {
            to,
            amount,
            source: PayoutSource::Caller,
        }
    }
}

/// Sum of the legs paid from `source`
pub fn total_from(payouts: &[Payout], source: PayoutSource) -> Result<u64> {
    payouts
        .iter()
        .filter(|payout| payout.source == source)
        .try_fold(0u64, |sum, payout| sum.checked_add(payout.amount))
        .ok_or_else(|| error!(PrivacyPoolError::ArithmeticOverflow))
}

pub trait AssetTransfer {
    /// Move `amount` of the pool asset from `from` into the vault
    fn pull(&mut self, from: &Pubkey, amount: u64) -> Result<()>;

    /// Move `amount` of the pool asset from the vault to `to`
    fn push(&mut self, to: &Pubkey, amount: u64) -> Result<()>;

    /// Pass lamports attached by the caller straight through to `to`
    fn forward_native(&mut self, to: &Pubkey, amount: u64) -> Result<()>;

    /// Fail if any leg of `payouts` cannot be made, moving nothing.
    ///
    /// Must reject every payout set on which `push` or `forward_native`
    /// would fail part way.
    fn preflight(&self, payouts: &[Payout]) -> Result<()>;

    /// Make every payout or none of them.
    fn pay_all(&mut self, payouts: &[Payout]) -> Result<()> {
        self.preflight(payouts)?;

        for payout in payouts.iter().filter(|payout| payout.amount > 0) {
            match payout.source {
                PayoutSource::Vault => self.push(&payout.to, payout.amount)?,
                PayoutSource::Caller => self.forward_native(&payout.to, payout.amount)?,
            }
        }

        Ok(())
    }
}

fn find_account<'a, 'info>(
    accounts: &'a [AccountInfo<'info>],
    key: &Pubkey,
) -> Result<&'a AccountInfo<'info>> {
    accounts
        .iter()
        .find(|info| info.key == key)
        .ok_or_else(|| error!(PrivacyPoolError::AssetMismatch))
}

fn transfer_lamports<'info>(
    system_program: &AccountInfo<'info>,
    from: &AccountInfo<'info>,
    to: &AccountInfo<'info>,
    amount: u64,
    signer_seeds: &[&[&[u8]]],
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }

    system_program::transfer(
        CpiContext::new_with_signer(
            system_program.clone(),
            system_program::Transfer {
                from: from.clone(),
                to: to.clone(),
            },
            signer_seeds,
        ),
        amount,
    )
}

/// Lamport pool: the vault is a system-owned PDA `[VAULT_SEED, pool]`
pub struct NativeVault<'info> {
    pub pool: Pubkey,
    pub vault: AccountInfo<'info>,
    pub vault_bump: u8,

    /// Transaction signer (depositor or relayer)
    pub payer: AccountInfo<'info>,

    /// Accounts allowed to receive lamports
    pub destinations: Vec<AccountInfo<'info>>,

    pub system_program: AccountInfo<'info>,
}

impl AssetTransfer for NativeVault<'_> {
    fn pull(&mut self, from: &Pubkey, amount: u64) -> Result<()> {
        require_keys_eq!(*from, self.payer.key(), PrivacyPoolError::AssetMismatch);
        transfer_lamports(&self.system_program, &self.payer, &self.vault, amount, &[])
    }

    fn push(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let destination = find_account(&self.destinations, to)?;
        let bump = [self.vault_bump];
        let seeds: &[&[u8]] = &[VAULT_SEED, self.pool.as_ref(), &bump];

        transfer_lamports(
            &self.system_program,
            &self.vault,
            destination,
            amount,
            &[seeds],
        )
    }

    fn forward_native(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let destination = find_account(&self.destinations, to)?;
        transfer_lamports(&self.system_program, &self.payer, destination, amount, &[])
    }

    fn preflight(&self, payouts: &[Payout]) -> Result<()> {
        for payout in payouts.iter().filter(|payout| payout.amount > 0) {
            find_account(&self.destinations, &payout.to)?;
        }

        require!(
            self.vault.lamports() >= total_from(payouts, PayoutSource::Vault)?,
            PrivacyPoolError::FailedInnerCall
        );
        require!(
            self.payer.lamports() >= total_from(payouts, PayoutSource::Caller)?,
            PrivacyPoolError::FailedInnerCall
        );

        Ok(())
    }
}

/// SPL token pool: the vault is a token account PDA `[VAULT_SEED, pool]`
/// whose authority is the pool config PDA.
pub struct TokenVault<'info> {
    pub mint: Pubkey,
    pub denomination: u64,
    pub pool: AccountInfo<'info>,
    pub pool_bump: u8,
    pub vault: AccountInfo<'info>,

    /// Transaction signer (depositor or relayer)
    pub payer: AccountInfo<'info>,

    /// Payer's token account; required to pull
    pub payer_token: Option<AccountInfo<'info>>,

    /// Token accounts and wallets allowed to receive funds
    pub destinations: Vec<AccountInfo<'info>>,

    pub token_program: AccountInfo<'info>,
    pub system_program: AccountInfo<'info>,
}

impl<'info> TokenVault<'info> {
    fn token_account_of(info: &AccountInfo<'info>) -> Option<TokenAccount> {
        if info.owner != &token::ID {
            return None;
        }
        let data = info.try_borrow_data().ok()?;
        TokenAccount::try_deserialize(&mut &data[..]).ok()
    }

    /// Token account of the pool mint owned by `owner`
    fn find_token_account(&self, owner: &Pubkey) -> Result<&AccountInfo<'info>> {
        self.destinations
            .iter()
            .find(|info| {
                Self::token_account_of(info)
                    .map(|account| account.owner == *owner && account.mint == self.mint)
                    .unwrap_or(false)
            })
            .ok_or_else(|| error!(PrivacyPoolError::AssetMismatch))
    }
}

impl AssetTransfer for TokenVault<'_> {
    fn pull(&mut self, from: &Pubkey, amount: u64) -> Result<()> {
        require_keys_eq!(*from, self.payer.key(), PrivacyPoolError::AssetMismatch);
        let source = self
            .payer_token
            .as_ref()
            .ok_or_else(|| error!(PrivacyPoolError::MissingAssetAccounts))?;

        let source_account =
            Self::token_account_of(source).ok_or_else(|| error!(PrivacyPoolError::AssetMismatch))?;
        require_keys_eq!(source_account.mint, self.mint, PrivacyPoolError::AssetMismatch);

        if amount == 0 {
            return Ok(());
        }

        token::transfer(
            CpiContext::new(
                self.token_program.clone(),
                token::Transfer {
                    from: source.clone(),
                    to: self.vault.clone(),
                    authority: self.payer.clone(),
                },
            ),
            amount,
        )
    }

    fn push(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let destination = self.find_token_account(to)?;
        let denomination = self.denomination.to_le_bytes();
        let bump = [self.pool_bump];
        let seeds: &[&[u8]] = &[POOL_SEED, self.mint.as_ref(), &denomination, &bump];

        token::transfer(
            CpiContext::new_with_signer(
                self.token_program.clone(),
                token::Transfer {
                    from: self.vault.clone(),
                    to: destination.clone(),
                    authority: self.pool.clone(),
                },
                &[seeds],
            ),
            amount,
        )
    }

    fn forward_native(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }

        let destination = find_account(&self.destinations, to)?;
        transfer_lamports(&self.system_program, &self.payer, destination, amount, &[])
    }

    fn preflight(&self, payouts: &[Payout]) -> Result<()> {
        for payout in payouts.iter().filter(|payout| payout.amount > 0) {
            match payout.source {
                PayoutSource::Vault => {
                    self.find_token_account(&payout.to)?;
                }
                PayoutSource::Caller => {
                    find_account(&self.destinations, &payout.to)?;
                }
            }
        }

        let vault_balance = Self::token_account_of(&self.vault)
            .map(|account| account.amount)
            .ok_or_else(|| error!(PrivacyPoolError::AssetMismatch))?;
        require!(
            vault_balance >= total_from(payouts, PayoutSource::Vault)?,
            PrivacyPoolError::FailedInnerCall
        );
        require!(
            self.payer.lamports() >= total_from(payouts, PayoutSource::Caller)?,
            PrivacyPoolError::FailedInnerCall
        );

        Ok(())
    }
}

/// Vault of either pool kind
pub enum PoolVault<'info> {
    Native(NativeVault<'info>),
    Token(TokenVault<'info>),
}

impl AssetTransfer for PoolVault<'_> {
    fn pull(&mut self, from: &Pubkey, amount: u64) -> Result<()> {
        match self {
            PoolVault::Native(vault) => vault.pull(from, amount),
            PoolVault::Token(vault) => vault.pull(from, amount),
        }
    }

    fn push(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        match self {
            PoolVault::Native(vault) => vault.push(to, amount),
            PoolVault::Token(vault) => vault.push(to, amount),
        }
    }

    fn forward_native(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        match self {
            PoolVault::Native(vault) => vault.forward_native(to, amount),
            PoolVault::Token(vault) => vault.forward_native(to, amount),
        }
    }

    fn preflight(&self, payouts: &[Payout]) -> Result<()> {
        match self {
            PoolVault::Native(vault) => vault.preflight(payouts),
            PoolVault::Token(vault) => vault.preflight(payouts),
        }
    }
}
