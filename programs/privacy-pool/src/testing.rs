//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use anchor_lang::error::Error;
use anchor_lang::prelude::*;
use anchor_lang::solana_program::program_pack::Pack;
use anchor_lang::system_program;
use anchor_spl::token;
use anchor_spl::token::spl_token::state::{Account as SplAccount, AccountState};

use crate::constants::FLAT_PROOF_LEN;
use crate::errors::PrivacyPoolError;
use crate::field::hash_to_field;
use crate::hasher::FieldHasher;
use crate::nullifier::{NullifierLedger, NullifierSet};
use crate::transfer::{total_from, AssetTransfer, Payout, PayoutSource};
use crate::verifier::ProofVerifier;

pub fn error_code(err: &Error) -> Option<u32> {
    match err {
        Error::AnchorError(anchor_error) => Some(anchor_error.error_code_number),
        Error::ProgramError(_) => None,
    }
}

#[track_caller]
pub fn assert_pool_error<T: std::fmt::Debug>(result: Result<T>, expected: PrivacyPoolError) {
    let expected_code: u32 = expected.into();
    match result {
        Err(err) => assert_eq!(
            error_code(&err),
            Some(expected_code),
            "unexpected error: {err}"
        ),
        Ok(value) => panic!("expected error {expected_code}, got Ok({value:?})"),
    }
}

/// Root of `leaves` computed level by level with no caching.
pub fn naive_root<H: FieldHasher>(
    hasher: &H,
    leaves: &[[u8; 32]],
    zeros: &[[u8; 32]],
    depth: u8,
) -> [u8; 32] {
    let mut layer = leaves.to_vec();
    for level in 0..depth as usize {
        layer = layer
            .chunks(2)
            .map(|pair| {
                hasher
                    .hash_pair(&pair[0], pair.get(1).unwrap_or(&zeros[level]))
                    .unwrap()
            })
            .collect();
    }
    layer.first().copied().unwrap_or(zeros[depth as usize])
}

/// Proof accepted by [`MockVerifier`] for `signals`
pub fn mock_prove(signals: &[[u8; 32]]) -> [[u8; 32]; FLAT_PROOF_LEN] {
    let mut proof = [[0u8; 32]; FLAT_PROOF_LEN];
    let parts: Vec<&[u8]> = signals.iter().map(|signal| signal.as_slice()).collect();
    proof[0] = hash_to_field(&parts);
    proof
}

/// Accepts exactly the proofs produced by [`mock_prove`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVerifier;

impl ProofVerifier for MockVerifier {
    fn verify(&self, public_signals: &[[u8; 32]], flat_proof: &[[u8; 32]; FLAT_PROOF_LEN]) -> bool {
        *flat_proof == mock_prove(public_signals)
    }
}

/// In-memory asset ledger with a single vault
#[derive(Debug, Default)]
pub struct MockBank {
    vault: u64,
    balances: BTreeMap<Pubkey, u64>,
    forwarded: BTreeMap<Pubkey, u64>,
    rejected: BTreeSet<Pubkey>,
    caller_limit: Option<u64>,
    pub pulls: Vec<(Pubkey, u64)>,
}

impl MockBank {
    pub fn funded(vault: u64) -> Self {
        Self {
            vault,
            ..Self::default()
        }
    }

    pub fn with_balance(mut self, owner: Pubkey, amount: u64) -> Self {
        self.balances.insert(owner, amount);
        self
    }

    /// Cap the lamports the caller can forward
    pub fn with_caller_limit(mut self, limit: u64) -> Self {
        self.caller_limit = Some(limit);
        self
    }

    /// Make every transfer to `key` fail
    pub fn reject(&mut self, key: Pubkey) {
        self.rejected.insert(key);
    }

    /// Undo [`MockBank::reject`]
    pub fn accept(&mut self, key: Pubkey) {
        self.rejected.remove(&key);
    }

    pub fn vault(&self) -> u64 {
        self.vault
    }

    pub fn balance(&self, key: &Pubkey) -> u64 {
        self.balances.get(key).copied().unwrap_or(0)
    }

    pub fn forwarded(&self, key: &Pubkey) -> u64 {
        self.forwarded.get(key).copied().unwrap_or(0)
    }
}

impl AssetTransfer for MockBank {
    fn pull(&mut self, from: &Pubkey, amount: u64) -> Result<()> {
        let balance = self.balances.entry(*from).or_default();
        require!(*balance >= amount, PrivacyPoolError::FailedInnerCall);
        *balance -= amount;
        self.vault += amount;
        self.pulls.push((*from, amount));
        Ok(())
    }

    fn push(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        require!(!self.rejected.contains(to), PrivacyPoolError::FailedInnerCall);
        require!(self.vault >= amount, PrivacyPoolError::FailedInnerCall);
        self.vault -= amount;
        *self.balances.entry(*to).or_default() += amount;
        Ok(())
    }

    fn forward_native(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        require!(!self.rejected.contains(to), PrivacyPoolError::FailedInnerCall);
        if let Some(limit) = self.caller_limit.as_mut() {
            require!(*limit >= amount, PrivacyPoolError::FailedInnerCall);
            *limit -= amount;
        }
        *self.forwarded.entry(*to).or_default() += amount;
        Ok(())
    }

    fn preflight(&self, payouts: &[Payout]) -> Result<()> {
        for payout in payouts.iter().filter(|payout| payout.amount > 0) {
            require!(
                !self.rejected.contains(&payout.to),
                PrivacyPoolError::FailedInnerCall
            );
        }
        require!(
            self.vault >= total_from(payouts, PayoutSource::Vault)?,
            PrivacyPoolError::FailedInnerCall
        );
        if let Some(limit) = self.caller_limit {
            require!(
                limit >= total_from(payouts, PayoutSource::Caller)?,
                PrivacyPoolError::FailedInnerCall
            );
        }
        Ok(())
    }
}

/// Ledger shared between an outer withdrawal and a reentrant one
pub type SharedLedger = Rc<RefCell<NullifierLedger>>;

impl NullifierSet for SharedLedger {
    fn is_spent(&self, nullifier: &[u8; 32]) -> bool {
        self.borrow().is_spent(nullifier)
    }

    fn mark_spent(&mut self, nullifier: [u8; 32]) -> Result<()> {
        self.borrow_mut().mark_spent(nullifier)
    }

    fn rollback(&mut self, nullifier: &[u8; 32]) {
        self.borrow_mut().rollback(nullifier)
    }
}

/// Bank whose first payout re-enters the pool through `reenter`
pub struct ReentrantBank<F: FnMut() -> Result<()>> {
    pub inner: MockBank,
    reenter: F,
    pub nested: Vec<Result<()>>,
}

impl<F: FnMut() -> Result<()>> ReentrantBank<F> {
    pub fn new(inner: MockBank, reenter: F) -> Self {
        Self {
            inner,
            reenter,
            nested: Vec::new(),
        }
    }
}

impl<F: FnMut() -> Result<()>> AssetTransfer for ReentrantBank<F> {
    fn pull(&mut self, from: &Pubkey, amount: u64) -> Result<()> {
        self.inner.pull(from, amount)
    }

    fn push(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        if self.nested.is_empty() {
            let outcome = (self.reenter)();
            let failed = outcome.is_err();
            self.nested.push(outcome);
            // A reverted inner call reverts the payout that made it
            require!(!failed, PrivacyPoolError::FailedInnerCall);
        }
        self.inner.push(to, amount)
    }

    fn forward_native(&mut self, to: &Pubkey, amount: u64) -> Result<()> {
        self.inner.forward_native(to, amount)
    }

    fn preflight(&self, payouts: &[Payout]) -> Result<()> {
        self.inner.preflight(payouts)
    }
}

/// Owned storage behind an `AccountInfo`
pub struct TestAccount {
    pub key: Pubkey,
    pub owner: Pubkey,
    pub lamports: u64,
    pub data: Vec<u8>,
}

impl TestAccount {
    pub fn new(key: Pubkey, owner: Pubkey, lamports: u64, data: Vec<u8>) -> Self {
        Self {
            key,
            owner,
            lamports,
            data,
        }
    }

    /// System-owned wallet with no data
    pub fn wallet(lamports: u64) -> Self {
        Self::new(Pubkey::new_unique(), system_program::ID, lamports, Vec::new())
    }

    /// Initialized SPL token account
    pub fn token(mint: Pubkey, owner: Pubkey, amount: u64) -> Self {
        let state = SplAccount {
            mint,
            owner,
            amount,
            state: AccountState::Initialized,
            ..SplAccount::default()
        };
        let mut data = vec![0u8; SplAccount::LEN];
        SplAccount::pack(state, &mut data).unwrap();
        Self::new(Pubkey::new_unique(), token::ID, 2_039_280, data)
    }

    pub fn info(&mut self) -> AccountInfo<'_> {
        AccountInfo::new(
            &self.key,
            false,
            true,
            &mut self.lamports,
            &mut self.data,
            &self.owner,
            false,
            0,
        )
    }
}
