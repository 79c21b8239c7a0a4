//! Pool orchestration: parameters, the shared deposit path, and an
//! in-memory pool that composes tree, known roots, nullifiers and the
//! withdrawal engine the same way the instructions do on-chain.

use anchor_lang::prelude::*;

use crate::constants::{COMMITMENT_TREE_SEED, MAX_DEPOSIT_BATCH, MAX_MERKLE_DEPTH};
use crate::errors::PrivacyPoolError;
use crate::field::is_canonical;
use crate::hasher::FieldHasher;
use crate::leaf_tree::{LeafTree, MerklePath};
use crate::merkle::{IncrementalMerkleTree, KnownRoots, RootHistory, RootSink};
use crate::note::{asset_metadata, commitment};
use crate::nullifier::{NullifierLedger, NullifierSet};
use crate::state::{AssetKind, PoolTerms};
use crate::transfer::AssetTransfer;
use crate::verifier::ProofVerifier;
use crate::withdrawal::{
    process_withdrawal, proof_is_valid, CallContext, WithdrawRequest, WithdrawalProof,
    WithdrawalRecord,
};

/// Pool creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    pub asset: Pubkey,
    pub kind: AssetKind,
    pub denomination: u64,
    pub merkle_depth: u8,
}

impl PoolParams {
    pub fn validate(&self) -> Result<()> {
        require!(self.denomination > 0, PrivacyPoolError::DenominationInvalid);
        require!(
            self.asset != Pubkey::default(),
            PrivacyPoolError::ZeroAddress
        );
        require!(
            self.merkle_depth > 0 && self.merkle_depth <= MAX_MERKLE_DEPTH,
            PrivacyPoolError::InvalidMerkleDepth
        );
        Ok(())
    }

    pub fn terms(&self) -> PoolTerms {
        PoolTerms {
            asset: self.asset,
            kind: self.kind,
            denomination: self.denomination,
            asset_metadata: asset_metadata(&self.asset, self.denomination),
        }
    }
}

/// One accepted deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRecord {
    pub raw_commitment: [u8; 32],
    pub commitment: [u8; 32],
    pub asset: Pubkey,
    pub denomination: u64,
    pub leaf_index: u64,
}

/// Shared deposit path.
///
/// Checks the batch and tree capacity, pulls `N * denomination` once, then
/// inserts every commitment. Nothing is pulled for a batch that cannot fit
/// or that carries a raw commitment outside the scalar field.
pub fn deposit_commitments<H, R, T>(
    hasher: &H,
    tree: &mut IncrementalMerkleTree,
    terms: &PoolTerms,
    depositor: &Pubkey,
    raw_commitments: &[[u8; 32]],
    roots: &mut R,
    transfer: &mut T,
) -> Result<Vec<DepositRecord>>
where
    H: FieldHasher,
    R: RootSink,
    T: AssetTransfer,
{
    require!(!raw_commitments.is_empty(), PrivacyPoolError::EmptyBatch);
    require!(
        raw_commitments.len() <= MAX_DEPOSIT_BATCH,
        PrivacyPoolError::BatchTooLarge
    );
    require!(
        raw_commitments.iter().all(is_canonical),
        PrivacyPoolError::FieldElementNotCanonical
    );
    let count = raw_commitments.len() as u64;
    require!(
        count <= tree.remaining(),
        PrivacyPoolError::MerkleTreeCapacity
    );

    let commitments = raw_commitments
        .iter()
        .map(|raw| commitment(hasher, raw, &terms.asset_metadata))
        .collect::<Result<Vec<[u8; 32]>>>()?;

    let total = terms
        .denomination
        .checked_mul(count)
        .ok_or_else(|| error!(PrivacyPoolError::ArithmeticOverflow))?;
    transfer.pull(depositor, total)?;

    let first = match commitments.as_slice() {
        [single] => tree.insert(hasher, *single, roots)?,
        batch => tree.insert_many(hasher, batch, roots)?,
    };

    Ok(raw_commitments
        .iter()
        .zip(commitments)
        .enumerate()
        .map(|(offset, (raw, commitment))| DepositRecord {
            raw_commitment: *raw,
            commitment,
            asset: terms.asset,
            denomination: terms.denomination,
            leaf_index: first + offset as u64,
        })
        .collect())
}

/// In-memory pool
pub struct PrivacyPool<H: FieldHasher + Clone, N: NullifierSet = NullifierLedger> {
    hasher: H,
    terms: PoolTerms,
    tree: IncrementalMerkleTree,
    mirror: LeafTree<H>,
    roots: KnownRoots,
    nullifiers: N,
}

impl<H: FieldHasher + Clone> PrivacyPool<H> {
    pub fn new(hasher: H, params: PoolParams) -> Result<Self> {
        Self::with_nullifiers(hasher, params, NullifierLedger::new())
    }
}

impl<H: FieldHasher + Clone, N: NullifierSet> PrivacyPool<H, N> {
    pub fn with_nullifiers(hasher: H, params: PoolParams, nullifiers: N) -> Result<Self> {
        params.validate()?;

        let tree = IncrementalMerkleTree::new(&hasher, params.merkle_depth, COMMITMENT_TREE_SEED)?;
        let mirror = LeafTree::new(hasher.clone(), params.merkle_depth, COMMITMENT_TREE_SEED)?;

        // The empty tree is a valid anchor for proofs
        let mut roots = KnownRoots::new();
        roots.record_root(tree.root)?;

        Ok(Self {
            hasher,
            terms: params.terms(),
            tree,
            mirror,
            roots,
            nullifiers,
        })
    }

    pub fn deposit<T: AssetTransfer>(
        &mut self,
        depositor: &Pubkey,
        raw_commitment: [u8; 32],
        transfer: &mut T,
    ) -> Result<DepositRecord> {
        let records = self.deposit_many(depositor, &[raw_commitment], transfer)?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| error!(PrivacyPoolError::EmptyBatch))
    }

    pub fn deposit_many<T: AssetTransfer>(
        &mut self,
        depositor: &Pubkey,
        raw_commitments: &[[u8; 32]],
        transfer: &mut T,
    ) -> Result<Vec<DepositRecord>> {
        let records = deposit_commitments(
            &self.hasher,
            &mut self.tree,
            &self.terms,
            depositor,
            raw_commitments,
            &mut self.roots,
            transfer,
        )?;

        let leaves: Vec<[u8; 32]> = records.iter().map(|record| record.commitment).collect();
        self.mirror.insert_many(&leaves)?;

        Ok(records)
    }

    pub fn withdraw<V: ProofVerifier, T: AssetTransfer>(
        &mut self,
        ctx: &CallContext,
        request: WithdrawRequest,
        verifier: &V,
        transfer: &mut T,
    ) -> Result<WithdrawalRecord> {
        process_withdrawal(
            request,
            &self.terms,
            ctx,
            &self.roots,
            &mut self.nullifiers,
            verifier,
            transfer,
        )
    }

    /// Gate 8 only, without touching state
    pub fn verify_withdrawal<V: ProofVerifier>(
        &self,
        proof: &WithdrawalProof,
        verifier: &V,
    ) -> Result<bool> {
        proof_is_valid(proof, &self.terms.asset_metadata, verifier)
    }

    pub fn terms(&self) -> &PoolTerms {
        &self.terms
    }

    pub fn latest_root(&self) -> [u8; 32] {
        self.tree.root
    }

    pub fn next_index(&self) -> u64 {
        self.tree.next_index
    }

    pub fn is_known_root(&self, root: &[u8; 32]) -> bool {
        self.roots.is_known_root(root)
    }

    pub fn known_roots(&self) -> &KnownRoots {
        &self.roots
    }

    pub fn is_spent(&self, nullifier: &[u8; 32]) -> bool {
        self.nullifiers.is_spent(nullifier)
    }

    pub fn path_of(&self, index: u64) -> Result<MerklePath> {
        self.mirror.path_of(index)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::constants::{DEFAULT_MERKLE_DEPTH, FLAT_PROOF_LEN, NATIVE_ASSET};
    use crate::field::from_u64;
    use crate::hasher::PoseidonHasher;
    use crate::merkle::zero_values;
    use crate::note::Note;
    use crate::testing::{
        assert_pool_error, error_code, mock_prove, naive_root, MockBank, MockVerifier,
        ReentrantBank, SharedLedger,
    };
    use crate::withdrawal::Withdrawal;

    const H: PoseidonHasher = PoseidonHasher;
    const DENOMINATION: u64 = 1_000_000;

    fn params(depth: u8) -> PoolParams {
        PoolParams {
            asset: NATIVE_ASSET,
            kind: AssetKind::Native,
            denomination: DENOMINATION,
            merkle_depth: depth,
        }
    }

    fn note(i: u64) -> Note {
        Note::new(H.hash(&[from_u64(i), from_u64(0xdead)]).unwrap())
    }

    /// Build a proof for the note deposited at `index`
    fn request_for<N: NullifierSet>(
        pool: &PrivacyPool<PoseidonHasher, N>,
        note: &Note,
        index: u64,
        relayer: Pubkey,
    ) -> WithdrawRequest {
        let mut proof = WithdrawalProof {
            access_type: 1,
            bit_length: 32,
            subset_data: vec![0xaa; 4],
            flat_proof: [[0u8; 32]; FLAT_PROOF_LEN],
            root: pool.latest_root(),
            subset_root: from_u64(99),
            nullifier: note.nullifier(&H, index).unwrap(),
            recipient: Pubkey::new_unique(),
            refund: 0,
            relayer,
            fee: 1_000,
            deadline: 0,
        };
        proof.flat_proof = mock_prove(&proof.public_signals(&pool.terms().asset_metadata));
        WithdrawRequest {
            proof,
            fee_receiver: relayer,
        }
    }

    fn ctx(caller: Pubkey) -> CallContext {
        CallContext {
            caller,
            now: 1_700_000_000,
            attached_value: 0,
        }
    }

    #[test]
    fn test_params_validation() {
        let mut p = params(DEFAULT_MERKLE_DEPTH);
        p.denomination = 0;
        assert_pool_error(p.validate(), PrivacyPoolError::DenominationInvalid);

        let mut p = params(DEFAULT_MERKLE_DEPTH);
        p.asset = Pubkey::default();
        assert_pool_error(p.validate(), PrivacyPoolError::ZeroAddress);

        assert_pool_error(params(0).validate(), PrivacyPoolError::InvalidMerkleDepth);
        assert_pool_error(params(33).validate(), PrivacyPoolError::InvalidMerkleDepth);
        params(32).validate().unwrap();
    }

    #[test]
    fn test_empty_root_known_at_creation() {
        let pool = PrivacyPool::new(H, params(8)).unwrap();
        assert!(pool.is_known_root(&pool.latest_root()));
        assert_eq!(pool.next_index(), 0);
    }

    // Scenario A
    #[test]
    fn test_single_deposit_matches_reference_root() {
        let mut pool = PrivacyPool::new(H, params(DEFAULT_MERKLE_DEPTH)).unwrap();
        let depositor = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, DENOMINATION);

        let raw = note(1).raw_commitment(&H).unwrap();
        let record = pool.deposit(&depositor, raw, &mut bank).unwrap();

        // Reference: the lone leaf hashed up against the empty subtrees
        let zeros = zero_values(&H, DEFAULT_MERKLE_DEPTH, COMMITMENT_TREE_SEED).unwrap();
        let leaf = commitment(&H, &raw, &pool.terms().asset_metadata).unwrap();
        let reference = zeros[..DEFAULT_MERKLE_DEPTH as usize]
            .iter()
            .fold(leaf, |node, zero| H.hash_pair(&node, zero).unwrap());

        assert_eq!(record.leaf_index, 0);
        assert_eq!(record.commitment, leaf);
        assert_eq!(pool.latest_root(), reference);
        assert!(pool.is_known_root(&reference));
        assert_eq!(bank.vault(), DENOMINATION);
        assert_eq!(bank.balance(&depositor), 0);
    }

    // Scenario B
    #[test]
    fn test_rotating_depositors() {
        let depth = 6;
        let mut pool = PrivacyPool::new(H, params(depth)).unwrap();
        let zeros = zero_values(&H, depth, COMMITMENT_TREE_SEED).unwrap();
        let depositors: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let mut bank = depositors
            .iter()
            .fold(MockBank::default(), |bank, d| bank.with_balance(*d, 5 * DENOMINATION));

        let mut leaves = Vec::new();
        for i in 0..20u64 {
            let depositor = depositors[(i % 4) as usize];
            let raw = note(i).raw_commitment(&H).unwrap();
            let record = pool.deposit(&depositor, raw, &mut bank).unwrap();

            let expected = commitment(&H, &raw, &pool.terms().asset_metadata).unwrap();
            assert_eq!(
                record,
                DepositRecord {
                    raw_commitment: raw,
                    commitment: expected,
                    asset: NATIVE_ASSET,
                    denomination: DENOMINATION,
                    leaf_index: i,
                }
            );

            leaves.push(expected);
            assert_eq!(pool.latest_root(), naive_root(&H, &leaves, &zeros, depth));
            let path = pool.path_of(i).unwrap();
            assert!(path.verify(&H, &expected, i, &pool.latest_root()));
        }

        assert_eq!(bank.vault(), 20 * DENOMINATION);
        assert_eq!(pool.known_roots().len(), 21);
    }

    #[test]
    fn test_batch_deposit() {
        let mut pool = PrivacyPool::new(H, params(5)).unwrap();
        let depositor = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, 10 * DENOMINATION);

        pool.deposit(&depositor, note(0).raw_commitment(&H).unwrap(), &mut bank).unwrap();
        let raws: Vec<[u8; 32]> = (1..6).map(|i| note(i).raw_commitment(&H).unwrap()).collect();
        let records = pool.deposit_many(&depositor, &raws, &mut bank).unwrap();

        assert_eq!(records.len(), 5);
        for (offset, record) in records.iter().enumerate() {
            assert_eq!(record.leaf_index, 1 + offset as u64);
            assert_eq!(record.raw_commitment, raws[offset]);
        }
        // One pull for the whole batch
        assert_eq!(bank.pulls, vec![(depositor, DENOMINATION), (depositor, 5 * DENOMINATION)]);
        // Initial root + one per deposit call
        assert_eq!(pool.known_roots().len(), 3);
        assert_eq!(pool.next_index(), 6);
    }

    #[test]
    fn test_full_tree_takes_no_funds() {
        let mut pool = PrivacyPool::new(H, params(2)).unwrap();
        let depositor = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, 10 * DENOMINATION);

        let raws: Vec<[u8; 32]> = (0..3).map(|i| note(i).raw_commitment(&H).unwrap()).collect();
        pool.deposit_many(&depositor, &raws, &mut bank).unwrap();

        assert_pool_error(
            pool.deposit_many(&depositor, &raws[..2], &mut bank),
            PrivacyPoolError::MerkleTreeCapacity,
        );
        assert_eq!(bank.balance(&depositor), 7 * DENOMINATION);

        // Index 2^D - 1 is the last one
        let last = pool.deposit(&depositor, note(9).raw_commitment(&H).unwrap(), &mut bank).unwrap();
        assert_eq!(last.leaf_index, 3);
        assert_pool_error(
            pool.deposit(&depositor, note(10).raw_commitment(&H).unwrap(), &mut bank),
            PrivacyPoolError::MerkleTreeCapacity,
        );
        assert_eq!(bank.balance(&depositor), 6 * DENOMINATION);
    }

    #[test]
    fn test_empty_and_oversized_batches_rejected() {
        let mut pool = PrivacyPool::new(H, params(8)).unwrap();
        let depositor = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, 100 * DENOMINATION);

        assert_pool_error(
            pool.deposit_many(&depositor, &[], &mut bank),
            PrivacyPoolError::EmptyBatch,
        );
        let too_many = vec![from_u64(1); MAX_DEPOSIT_BATCH + 1];
        assert_pool_error(
            pool.deposit_many(&depositor, &too_many, &mut bank),
            PrivacyPoolError::BatchTooLarge,
        );
        let largest = vec![from_u64(1); MAX_DEPOSIT_BATCH];
        pool.deposit_many(&depositor, &largest, &mut bank).unwrap();
        assert_eq!(bank.pulls, vec![(depositor, MAX_DEPOSIT_BATCH as u64 * DENOMINATION)]);
    }

    #[test]
    fn test_non_canonical_commitment_takes_no_funds() {
        let mut pool = PrivacyPool::new(H, params(4)).unwrap();
        let depositor = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, 2 * DENOMINATION);
        let root = pool.latest_root();

        assert_pool_error(
            pool.deposit_many(&depositor, &[from_u64(1), [0xff; 32]], &mut bank),
            PrivacyPoolError::FieldElementNotCanonical,
        );
        assert!(bank.pulls.is_empty());
        assert_eq!(pool.latest_root(), root);
    }

    #[test]
    fn test_underfunded_deposit_leaves_tree_untouched() {
        let mut pool = PrivacyPool::new(H, params(4)).unwrap();
        let depositor = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, DENOMINATION - 1);
        let root = pool.latest_root();

        assert_pool_error(
            pool.deposit(&depositor, note(1).raw_commitment(&H).unwrap(), &mut bank),
            PrivacyPoolError::FailedInnerCall,
        );
        assert_eq!(pool.latest_root(), root);
        assert_eq!(pool.next_index(), 0);
    }

    #[test]
    fn test_deposit_then_withdraw() {
        let mut pool = PrivacyPool::new(H, params(10)).unwrap();
        let depositor = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, DENOMINATION);

        let n = note(3);
        let record = pool.deposit(&depositor, n.raw_commitment(&H).unwrap(), &mut bank).unwrap();
        let request = request_for(&pool, &n, record.leaf_index, relayer);

        assert!(pool.verify_withdrawal(&request.proof, &MockVerifier).unwrap());
        let mut forged = request.proof.clone();
        forged.fee += 1;
        assert!(!pool.verify_withdrawal(&forged, &MockVerifier).unwrap());
        let withdrawal = pool
            .withdraw(&ctx(relayer), request.clone(), &MockVerifier, &mut bank)
            .unwrap();

        assert_eq!(withdrawal.nullifier, n.nullifier(&H, 0).unwrap());
        assert_eq!(withdrawal.subset_root, from_u64(99));
        assert_eq!(withdrawal.fee, 1_000);
        assert_eq!(bank.balance(&request.proof.recipient), DENOMINATION - 1_000);
        assert_eq!(bank.balance(&relayer), 1_000);
        assert!(pool.is_spent(&withdrawal.nullifier));
    }

    // Scenario C
    #[test]
    fn test_zero_root_unknown() {
        let mut pool = PrivacyPool::new(H, params(10)).unwrap();
        let depositor = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, DENOMINATION);
        let n = note(1);
        pool.deposit(&depositor, n.raw_commitment(&H).unwrap(), &mut bank).unwrap();

        let mut request = request_for(&pool, &n, 0, relayer);
        request.proof.root = [0u8; 32];
        request.proof.flat_proof =
            mock_prove(&request.proof.public_signals(&pool.terms().asset_metadata));

        assert_pool_error(
            pool.withdraw(&ctx(relayer), request, &MockVerifier, &mut bank),
            PrivacyPoolError::UnknownRoot,
        );
        assert_eq!(bank.vault(), DENOMINATION);
    }

    // Scenario D
    #[test]
    fn test_double_withdrawal_rejected() {
        let mut pool = PrivacyPool::new(H, params(10)).unwrap();
        let depositor = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, 2 * DENOMINATION);

        let n = note(1);
        pool.deposit(&depositor, n.raw_commitment(&H).unwrap(), &mut bank).unwrap();
        let first = request_for(&pool, &n, 0, relayer);
        pool.deposit(&depositor, note(2).raw_commitment(&H).unwrap(), &mut bank).unwrap();

        // Same nullifier, proven against the newer root
        let second = request_for(&pool, &n, 0, relayer);
        assert_ne!(first.proof.root, second.proof.root);

        pool.withdraw(&ctx(relayer), first, &MockVerifier, &mut bank).unwrap();
        assert_pool_error(
            pool.withdraw(&ctx(relayer), second, &MockVerifier, &mut bank),
            PrivacyPoolError::NoteAlreadySpent,
        );
        assert_eq!(bank.vault(), DENOMINATION);
    }

    #[test]
    fn test_old_roots_stay_valid() {
        let mut pool = PrivacyPool::new(H, params(10)).unwrap();
        let depositor = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let mut bank = MockBank::default().with_balance(depositor, 40 * DENOMINATION);

        let n = note(0);
        pool.deposit(&depositor, n.raw_commitment(&H).unwrap(), &mut bank).unwrap();
        let request = request_for(&pool, &n, 0, relayer);

        for i in 1..40 {
            pool.deposit(&depositor, note(i).raw_commitment(&H).unwrap(), &mut bank).unwrap();
        }

        pool.withdraw(&ctx(relayer), request, &MockVerifier, &mut bank).unwrap();
    }

    #[test]
    fn test_reentrant_withdrawal_rejected() {
        let ledger: SharedLedger = Rc::new(RefCell::new(NullifierLedger::new()));
        let mut pool =
            PrivacyPool::with_nullifiers(H, params(8), Rc::clone(&ledger)).unwrap();
        let depositor = Pubkey::new_unique();
        let relayer = Pubkey::new_unique();
        let mut funding = MockBank::default().with_balance(depositor, DENOMINATION);

        let n = note(5);
        pool.deposit(&depositor, n.raw_commitment(&H).unwrap(), &mut funding).unwrap();
        let request = request_for(&pool, &n, 0, relayer);

        // The payout tries to run the same withdrawal again
        let terms = *pool.terms();
        let roots = pool.known_roots().clone();
        let nested_request = request.clone();
        let nested_ledger = Rc::clone(&ledger);
        let mut bank = ReentrantBank::new(MockBank::funded(DENOMINATION), move || {
            Withdrawal::new(nested_request.clone())
                .validate(&terms, &ctx(relayer), &roots, &nested_ledger)
                .map(|_| ())
        });

        assert_pool_error(
            pool.withdraw(&ctx(relayer), request.clone(), &MockVerifier, &mut bank),
            PrivacyPoolError::FailedInnerCall,
        );

        assert_eq!(bank.nested.len(), 1);
        let nested = bank.nested[0].as_ref().map_err(error_code);
        assert_eq!(
            nested,
            Err(Some(u32::from(PrivacyPoolError::NoteAlreadySpent)))
        );
        assert!(!pool.is_spent(&request.proof.nullifier));
        assert_eq!(bank.inner.vault(), DENOMINATION);
    }
}
