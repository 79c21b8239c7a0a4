use anchor_lang::prelude::*;

/// Emitted when a pool is created
#[event]
pub struct PoolInitialized {
    pub pool: Pubkey,
    pub admin: Pubkey,
    pub asset: Pubkey,
    pub denomination: u64,
    pub merkle_depth: u8,
    pub empty_root: [u8; 32],
    pub timestamp: i64,
}

/// Emitted when the verification key is set or replaced
#[event]
pub struct VerificationKeySet {
    pub pool: Pubkey,
    pub vk_hash: [u8; 32],
    pub timestamp: i64,
}

/// Emitted once per inserted commitment
#[event]
pub struct Deposit {
    pub pool: Pubkey,
    pub raw_commitment: [u8; 32],
    pub commitment: [u8; 32],
    pub asset: Pubkey,
    pub denomination: u64,
    pub leaf_index: u64,
    pub timestamp: i64,
}

/// Emitted when a note is withdrawn
#[event]
pub struct Withdrawal {
    pub pool: Pubkey,
    pub recipient: Pubkey,
    pub relayer: Pubkey,
    pub subset_root: [u8; 32],
    pub nullifier: [u8; 32],
    pub fee: u64,
    pub timestamp: i64,
}
