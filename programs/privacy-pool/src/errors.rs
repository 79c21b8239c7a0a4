use anchor_lang::prelude::*;

#[error_code]
pub enum PrivacyPoolError {
    #[msg("Invalid Merkle depth: must be between 1 and MAX_MERKLE_DEPTH")]
    InvalidMerkleDepth,

    #[msg("Denomination must be greater than zero")]
    DenominationInvalid,

    #[msg("Address must not be the zero address")]
    ZeroAddress,

    #[msg("Merkle tree is full")]
    MerkleTreeCapacity,

    #[msg("Deposit batch is empty")]
    EmptyBatch,

    #[msg("Deposit batch is larger than MAX_DEPOSIT_BATCH")]
    BatchTooLarge,

    #[msg("Leaf index has not been written")]
    LeafIndexOutOfRange,

    #[msg("Computed Merkle root does not match the supplied root record")]
    RootMismatch,

    #[msg("Withdrawal deadline has passed")]
    CallExpired,

    #[msg("Fee exceeds denomination")]
    FeeExceedsDenomination,

    #[msg("Attached value does not match the refund")]
    MsgValueInvalid,

    #[msg("Caller is not the relayer bound by the proof")]
    RelayerMismatch,

    #[msg("Merkle root is not a known root of this pool")]
    UnknownRoot,

    #[msg("Note already spent")]
    NoteAlreadySpent,

    #[msg("Zero-knowledge proof is invalid")]
    InvalidZkProof,

    #[msg("Asset transfer failed")]
    FailedInnerCall,

    #[msg("Asset accounts do not match the pool asset")]
    AssetMismatch,

    #[msg("Token pool instruction is missing its token accounts")]
    MissingAssetAccounts,

    #[msg("Compliance payload exceeds MAX_SUBSET_DATA_LEN")]
    SubsetDataTooLong,

    #[msg("Value is not a canonical BN254 scalar field element")]
    FieldElementNotCanonical,

    #[msg("Poseidon hash failed")]
    HashFailed,

    #[msg("Arithmetic overflow")]
    ArithmeticOverflow,

    #[msg("Unauthorized: pool admin only")]
    Unauthorized,

    #[msg("Verification key hash mismatch")]
    VkHashMismatch,

    #[msg("Verification key not set for this pool")]
    VkNotSet,

    #[msg("Invalid verification key data")]
    InvalidVkData,
}
