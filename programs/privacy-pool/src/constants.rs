use anchor_lang::prelude::Pubkey;

/// Maximum Merkle tree depth supported
pub const MAX_MERKLE_DEPTH: u8 = 32;

/// Default Merkle tree depth (2^20 deposits per pool)
pub const DEFAULT_MERKLE_DEPTH: u8 = 20;

// Encoding: all field elements and curve coordinates are BIG-ENDIAN, matching
// the alt_bn128 syscalls. G2 points use the EIP-197 order (x_im, x_re, y_im, y_re).

/// BN254 scalar field modulus `r`, big-endian
pub const BN254_SCALAR_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// BN254 base field modulus `q`, big-endian (G1 coordinate field)
pub const BN254_BASE_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x97, 0x81, 0x6a, 0x91, 0x68, 0x71, 0xca, 0x8d, 0x3c, 0x20, 0x8c, 0x16, 0xd8, 0x7c, 0xfd, 0x47,
];

/// Asset key of lamport pools (the wrapped-SOL mint address)
pub const NATIVE_ASSET: Pubkey = anchor_spl::token::spl_token::native_mint::ID;

/// PDA seeds
pub const POOL_SEED: &[u8] = b"pool";
pub const TREE_SEED: &[u8] = b"tree";
pub const VK_SEED: &[u8] = b"vk";
pub const ROOT_SEED: &[u8] = b"root";
pub const NULLIFIER_SEED: &[u8] = b"nullifier";
pub const VAULT_SEED: &[u8] = b"vault";

/// Domain seeds for the zero value of each tree kind.
/// zeros[0] = hash_to_field(seed); distinct seeds keep empty subtrees apart.
pub const COMMITMENT_TREE_SEED: &[u8] = b"empty";
pub const ALLOWED_MARKER_SEED: &[u8] = b"allowed";
pub const BLOCKED_MARKER_SEED: &[u8] = b"blocked";

/// Widest Poseidon instance supported by the syscall
pub const MAX_POSEIDON_INPUTS: usize = 12;

/// Domain tag mixed into every nullifier: H(secret, tag, leaf_index)
pub const NULLIFIER_DOMAIN_TAG: u64 = 1;

/// Access types carried in a withdrawal proof
pub const ACCESS_TYPE_BLOCKLIST: u8 = 0;
pub const ACCESS_TYPE_ALLOWLIST: u8 = 1;

/// Groth16 proof flattened to field elements: A (2) + B (4) + C (2)
pub const FLAT_PROOF_LEN: usize = 8;

/// Public signals of the withdrawal circuit:
/// root, subset_root, nullifier, asset_metadata, withdraw_metadata
pub const WITHDRAW_PUBLIC_INPUTS: usize = 5;

/// Maximum size of the opaque compliance payload carried in a proof
pub const MAX_SUBSET_DATA_LEN: usize = 256;

/// Maximum number of commitments accepted by a single `deposit_many`
pub const MAX_DEPOSIT_BATCH: usize = 16;
