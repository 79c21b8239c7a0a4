//! Withdrawal engine.
//!
//! A withdrawal moves through `Received -> Validated -> ProofChecked ->
//! Settled`; each transition runs its gates in a fixed order and consumes
//! the previous stage, so settlement can only be reached through every gate.
//!
//! Gates:
//!   1. deadline (0 = none)            CallExpired
//!   2. recipient non-zero             ZeroAddress
//!   3. fee <= denomination            FeeExceedsDenomination
//!   4. attached value matches refund  MsgValueInvalid
//!   5. caller is the relayer          RelayerMismatch
//!   6. root is known                  UnknownRoot
//!   7. nullifier unspent              NoteAlreadySpent
//!   8. proof verifies                 InvalidZkProof
//!
//! Settlement spends the nullifier before any funds move, then makes every
//! payout leg or none of them.

use anchor_lang::prelude::*;

use crate::constants::{FLAT_PROOF_LEN, MAX_SUBSET_DATA_LEN, WITHDRAW_PUBLIC_INPUTS};
use crate::errors::PrivacyPoolError;
use crate::field::hash_to_field;
use crate::merkle::RootHistory;
use crate::nullifier::NullifierSet;
use crate::state::{AssetKind, PoolTerms};
use crate::transfer::{AssetTransfer, Payout};
use crate::verifier::ProofVerifier;

/// Public statement of a withdrawal plus its Groth16 proof
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalProof {
    /// 0 = block list, 1 = allow list
    pub access_type: u8,
    pub bit_length: u32,
    /// Opaque compliance payload, bound through `withdraw_metadata`
    pub subset_data: Vec<u8>,
    pub flat_proof: [[u8; 32]; FLAT_PROOF_LEN],
    pub root: [u8; 32],
    pub subset_root: [u8; 32],
    pub nullifier: [u8; 32],
    pub recipient: Pubkey,
    /// Lamports the relayer attaches and the recipient receives
    pub refund: u64,
    pub relayer: Pubkey,
    pub fee: u64,
    /// Unix timestamp; 0 means no deadline
    pub deadline: i64,
}

impl WithdrawalProof {
    /// hash_to_field(recipient ‖ refund ‖ relayer ‖ fee ‖ deadline ‖
    ///               access_type ‖ bit_length ‖ subset_data), integers big-endian
    pub fn withdraw_metadata(&self) -> [u8; 32] {
        hash_to_field(&[
            self.recipient.as_ref(),
            &self.refund.to_be_bytes(),
            self.relayer.as_ref(),
            &self.fee.to_be_bytes(),
            &self.deadline.to_be_bytes(),
            &[self.access_type],
            &self.bit_length.to_be_bytes(),
            &self.subset_data,
        ])
    }

    pub fn public_signals(&self, asset_metadata: &[u8; 32]) -> [[u8; 32]; WITHDRAW_PUBLIC_INPUTS] {
        [
            self.root,
            self.subset_root,
            self.nullifier,
            *asset_metadata,
            self.withdraw_metadata(),
        ]
    }
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub proof: WithdrawalProof,
    /// Receives `fee`; `Pubkey::default()` waives the fee. Not bound by the proof.
    pub fee_receiver: Pubkey,
}

/// Who is calling, when, and with how many attached lamports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Pubkey,
    pub now: i64,
    pub attached_value: u64,
}

/// Outcome of a settled withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRecord {
    pub recipient: Pubkey,
    pub relayer: Pubkey,
    pub subset_root: [u8; 32],
    pub nullifier: [u8; 32],
    pub fee: u64,
    pub fee_receiver: Pubkey,
    pub recipient_amount: u64,
    pub fee_amount: u64,
    pub refund: u64,
}

pub struct Received;
pub struct Validated;
pub struct ProofChecked;
pub struct Settled {
    record: WithdrawalRecord,
}

pub struct Withdrawal<S> {
    request: WithdrawRequest,
    stage: S,
}

impl<S> Withdrawal<S> {
    pub fn request(&self) -> &WithdrawRequest {
        &self.request
    }
}

impl Withdrawal<Received> {
    pub fn new(request: WithdrawRequest) -> Self {
        Self {
            request,
            stage: Received,
        }
    }

    /// Gates 1-7
    pub fn validate<R: RootHistory, N: NullifierSet>(
        self,
        terms: &PoolTerms,
        ctx: &CallContext,
        roots: &R,
        nullifiers: &N,
    ) -> Result<Withdrawal<Validated>> {
        let proof = &self.request.proof;

        require!(
            proof.deadline == 0 || ctx.now <= proof.deadline,
            PrivacyPoolError::CallExpired
        );
        require!(
            proof.recipient != Pubkey::default(),
            PrivacyPoolError::ZeroAddress
        );
        require!(
            proof.fee <= terms.denomination,
            PrivacyPoolError::FeeExceedsDenomination
        );

        let value_consistent = match terms.kind {
            AssetKind::Token => ctx.attached_value == proof.refund,
            AssetKind::Native => proof.refund == 0 && ctx.attached_value == 0,
        };
        require!(value_consistent, PrivacyPoolError::MsgValueInvalid);

        require_keys_eq!(ctx.caller, proof.relayer, PrivacyPoolError::RelayerMismatch);
        require!(
            roots.is_known_root(&proof.root),
            PrivacyPoolError::UnknownRoot
        );
        require!(
            !nullifiers.is_spent(&proof.nullifier),
            PrivacyPoolError::NoteAlreadySpent
        );

        Ok(Withdrawal {
            request: self.request,
            stage: Validated,
        })
    }
}

/// Gate 8 without the state checks; also backs the read-only
/// `verify_withdrawal`. Only a malformed payload is an error.
pub fn proof_is_valid<V: ProofVerifier>(
    proof: &WithdrawalProof,
    asset_metadata: &[u8; 32],
    verifier: &V,
) -> Result<bool> {
    require!(
        proof.subset_data.len() <= MAX_SUBSET_DATA_LEN,
        PrivacyPoolError::SubsetDataTooLong
    );

    let signals = proof.public_signals(asset_metadata);
    Ok(verifier.verify(&signals, &proof.flat_proof))
}

impl Withdrawal<Validated> {
    pub fn check_proof<V: ProofVerifier>(
        self,
        terms: &PoolTerms,
        verifier: &V,
    ) -> Result<Withdrawal<ProofChecked>> {
        require!(
            proof_is_valid(&self.request.proof, &terms.asset_metadata, verifier)?,
            PrivacyPoolError::InvalidZkProof
        );

        Ok(Withdrawal {
            request: self.request,
            stage: ProofChecked,
        })
    }
}

impl Withdrawal<ProofChecked> {
    /// Spend the nullifier, then pay out all legs at once. A failed payout
    /// moves no funds, unspends the nullifier and surfaces as
    /// `FailedInnerCall`.
    pub fn settle<N: NullifierSet, T: AssetTransfer>(
        self,
        terms: &PoolTerms,
        nullifiers: &mut N,
        transfer: &mut T,
    ) -> Result<Withdrawal<Settled>> {
        let WithdrawRequest {
            proof,
            fee_receiver,
        } = &self.request;

        let (recipient_amount, fee_amount) = if *fee_receiver == Pubkey::default() {
            (terms.denomination, 0)
        } else {
            let net = terms
                .denomination
                .checked_sub(proof.fee)
                .ok_or_else(|| error!(PrivacyPoolError::ArithmeticOverflow))?;
            (net, proof.fee)
        };

        nullifiers.mark_spent(proof.nullifier)?;

        let payouts = [
            Payout::from_vault(proof.recipient, recipient_amount),
            Payout::from_vault(*fee_receiver, fee_amount),
            Payout::from_caller(proof.recipient, proof.refund),
        ];

        if let Err(err) = transfer.pay_all(&payouts) {
            nullifiers.rollback(&proof.nullifier);
            msg!("Withdrawal payout failed: {}", err);
            return err!(PrivacyPoolError::FailedInnerCall);
        }

        let record = WithdrawalRecord {
            recipient: proof.recipient,
            relayer: proof.relayer,
            subset_root: proof.subset_root,
            nullifier: proof.nullifier,
            fee: proof.fee,
            fee_receiver: *fee_receiver,
            recipient_amount,
            fee_amount,
            refund: proof.refund,
        };

        Ok(Withdrawal {
            request: self.request,
            stage: Settled { record },
        })
    }
}

impl Withdrawal<Settled> {
    pub fn record(&self) -> &WithdrawalRecord {
        &self.stage.record
    }

    pub fn into_record(self) -> WithdrawalRecord {
        self.stage.record
    }
}

/// Run a request through every stage.
pub fn process_withdrawal<R, N, V, T>(
    request: WithdrawRequest,
    terms: &PoolTerms,
    ctx: &CallContext,
    roots: &R,
    nullifiers: &mut N,
    verifier: &V,
    transfer: &mut T,
) -> Result<WithdrawalRecord>
where
    R: RootHistory,
    N: NullifierSet,
    V: ProofVerifier,
    T: AssetTransfer,
{
    let settled = Withdrawal::new(request)
        .validate(terms, ctx, roots, nullifiers)?
        .check_proof(terms, verifier)?
        .settle(terms, nullifiers, transfer)?;

    Ok(settled.into_record())
}
