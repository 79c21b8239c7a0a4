//! Spent-nullifier ledger.
//!
//! On-chain every nullifier lives in its own `SpentNullifier` PDA; the
//! in-memory [`NullifierLedger`] backs the orchestrator and the tests.

use std::collections::BTreeSet;

use anchor_lang::prelude::*;

use crate::errors::PrivacyPoolError;
use crate::state::SpentNullifier;

pub trait NullifierSet {
    fn is_spent(&self, nullifier: &[u8; 32]) -> bool;

    /// Record `nullifier` as spent; fails if it already is.
    fn mark_spent(&mut self, nullifier: [u8; 32]) -> Result<()>;

    /// Undo a `mark_spent` made by the settlement that is currently failing.
    fn rollback(&mut self, nullifier: &[u8; 32]);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullifierLedger {
    spent: BTreeSet<[u8; 32]>,
}

impl NullifierLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

impl NullifierSet for NullifierLedger {
    fn is_spent(&self, nullifier: &[u8; 32]) -> bool {
        self.spent.contains(nullifier)
    }

    fn mark_spent(&mut self, nullifier: [u8; 32]) -> Result<()> {
        require!(
            self.spent.insert(nullifier),
            PrivacyPoolError::NoteAlreadySpent
        );
        Ok(())
    }

    fn rollback(&mut self, nullifier: &[u8; 32]) {
        self.spent.remove(nullifier);
    }
}

/// A `SpentNullifier` account answers for the single nullifier its PDA is
/// derived from.
impl NullifierSet for SpentNullifier {
    fn is_spent(&self, nullifier: &[u8; 32]) -> bool {
        self.spent && self.nullifier == *nullifier
    }

    fn mark_spent(&mut self, nullifier: [u8; 32]) -> Result<()> {
        require!(!self.is_spent(&nullifier), PrivacyPoolError::NoteAlreadySpent);
        self.nullifier = nullifier;
        self.spent = true;
        Ok(())
    }

    fn rollback(&mut self, nullifier: &[u8; 32]) {
        if self.nullifier == *nullifier {
            self.spent = false;
        }
    }
}
