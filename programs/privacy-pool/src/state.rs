use crate::constants::*;
use crate::errors::PrivacyPoolError;
use crate::merkle::{IncrementalMerkleTree, RootHistory, RootSink};
use anchor_lang::prelude::*;

/// Which asset a pool holds
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    /// Lamports held directly by the vault PDA
    Native,
    /// SPL tokens held by the vault token account
    Token,
}

/// Per-pool configuration, addressed by `[POOL_SEED, asset, denomination_le]`
#[account]
pub struct PoolConfig {
    /// Administrator public key (sets the verification key)
    pub admin: Pubkey,

    /// Token mint, or `NATIVE_ASSET` for lamport pools
    pub asset: Pubkey,

    pub kind: AssetKind,

    /// Fixed deposit / withdrawal amount in base units
    pub denomination: u64,

    /// Merkle tree depth (1-32)
    pub merkle_depth: u8,

    /// hash_to_field(asset ‖ denomination), public signal of every proof
    pub asset_metadata: [u8; 32],

    /// Hash of the active verification key (zero until set)
    pub vk_hash: [u8; 32],

    /// PDA bumps
    pub bump: u8,
    pub vault_bump: u8,
}

impl PoolConfig {
    pub const LEN: usize = 8 + // discriminator
        32 + // admin
        32 + // asset
        1 +  // kind
        8 +  // denomination
        1 +  // merkle_depth
        32 + // asset_metadata
        32 + // vk_hash
        1 +  // bump
        1; // vault_bump

    pub fn terms(&self) -> PoolTerms {
        PoolTerms {
            asset: self.asset,
            kind: self.kind,
            denomination: self.denomination,
            asset_metadata: self.asset_metadata,
        }
    }
}

/// The subset of pool configuration the deposit and withdrawal paths read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolTerms {
    pub asset: Pubkey,
    pub kind: AssetKind,
    pub denomination: u64,
    pub asset_metadata: [u8; 32],
}

/// Verification key storage for the withdrawal circuit
#[account]
#[derive(Default)]
pub struct VerificationKeyAccount {
    pub pool: Pubkey,

    /// Number of public inputs expected
    pub n_public: u32,

    /// Verification key data (serialized in Groth16 format)
    /// Format: alpha_g1 (64 bytes) + beta_g2 (128 bytes) +
    ///         gamma_g2 (128 bytes) + delta_g2 (128 bytes) +
    ///         IC points (n_public+1) * 64 bytes
    pub vk_data: Vec<u8>,

    /// Hash of verification key (for integrity checks)
    pub vk_hash: [u8; 32],

    /// PDA bump
    pub bump: u8,
}

impl VerificationKeyAccount {
    pub const BASE_LEN: usize = 8 + // discriminator
        32 + // pool
        4 +  // n_public
        4 +  // vk_data vec length
        32 + // vk_hash
        1; // bump

    pub fn space_for(n_public: usize) -> usize {
        Self::BASE_LEN + Self::vk_data_len(n_public)
    }

    /// Calculate expected VK data length for Groth16
    /// alpha_g1 (64) + beta_g2 (128) + gamma_g2 (128) + delta_g2 (128) + IC[(n_public+1) * 64]
    pub fn vk_data_len(n_public: usize) -> usize {
        448 + (n_public + 1) * 64
    }

    pub fn is_set(&self) -> bool {
        !self.vk_data.is_empty() && self.vk_hash != [0u8; 32]
    }
}

/// Commitment tree of one pool
#[account(zero_copy)]
pub struct CommitmentTreeAccount {
    pub pool: Pubkey,
    pub tree: IncrementalMerkleTree,
}

impl CommitmentTreeAccount {
    pub const LEN: usize = 8 + std::mem::size_of::<CommitmentTreeAccount>();
}

/// One historical root, addressed by `[ROOT_SEED, pool, root]`.
/// Existence of the account is what makes the root known.
#[account]
pub struct RootRecord {
    pub pool: Pubkey,
    pub root: [u8; 32],

    /// Number of leaves in the tree when this root was produced
    pub leaf_count: u64,

    pub bump: u8,
}

impl RootRecord {
    pub const LEN: usize = 8 + // discriminator
        32 + // pool
        32 + // root
        8 +  // leaf_count
        1; // bump
}

/// Spent marker for one nullifier, addressed by `[NULLIFIER_SEED, pool, nullifier]`
#[account]
#[derive(Default)]
pub struct SpentNullifier {
    pub pool: Pubkey,
    pub nullifier: [u8; 32],
    pub spent: bool,
    pub spent_at: i64,
    pub bump: u8,
}

impl SpentNullifier {
    pub const LEN: usize = 8 + // discriminator
        32 + // pool
        32 + // nullifier
        1 +  // spent
        8 +  // spent_at
        1; // bump
}

/// Fills a freshly created `RootRecord` with the root the tree produces.
///
/// The record's address already commits to the root the client expected, so
/// any other root means the tree moved underneath the transaction.
pub struct RootRecorder<'a> {
    pub record: &'a mut RootRecord,
    pub pool: Pubkey,
    pub expected_root: [u8; 32],
    pub leaf_count: u64,
    pub bump: u8,
}

impl RootSink for RootRecorder<'_> {
    fn record_root(&mut self, root: [u8; 32]) -> Result<()> {
        require!(root == self.expected_root, PrivacyPoolError::RootMismatch);

        self.record.pool = self.pool;
        self.record.root = root;
        self.record.leaf_count = self.leaf_count;
        self.record.bump = self.bump;

        Ok(())
    }
}

/// Answers `is_known_root` from a caller-supplied account that should be the
/// root's `RootRecord` PDA.
pub struct RootRecordLookup<'a, 'info> {
    pub pool: Pubkey,
    pub account: &'a AccountInfo<'info>,
}

impl RootHistory for RootRecordLookup<'_, '_> {
    fn is_known_root(&self, root: &[u8; 32]) -> bool {
        let (expected, _) =
            Pubkey::find_program_address(&[ROOT_SEED, self.pool.as_ref(), root], &crate::ID);
        if self.account.key() != expected || self.account.owner != &crate::ID {
            return false;
        }

        let data = match self.account.try_borrow_data() {
            Ok(data) => data,
            Err(_) => return false,
        };
        match RootRecord::try_deserialize(&mut &data[..]) {
            Ok(record) => record.pool == self.pool && record.root == *root,
            Err(_) => false,
        }
    }
}
