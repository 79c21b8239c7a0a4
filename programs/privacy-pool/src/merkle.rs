//! Incremental Merkle tree for commitment storage
//!
//! Append-only tree that keeps only the rightmost left-child hash per level
//! (`filled_subtrees`) and the empty-subtree hashes (`zeros`), so an insert
//! costs `depth` hashes and the state fits in a fixed-size zero-copy account.
//!
//! Every root the tree produces is handed to a [`RootSink`]; the known-root
//! set is append-only and never evicts.

use std::collections::BTreeSet;

use anchor_lang::prelude::*;

use crate::constants::MAX_MERKLE_DEPTH;
use crate::errors::PrivacyPoolError;
use crate::field::hash_to_field;
use crate::hasher::FieldHasher;

/// Receives every root the tree computes.
pub trait RootSink {
    fn record_root(&mut self, root: [u8; 32]) -> Result<()>;
}

/// Membership lookup over historical roots.
pub trait RootHistory {
    fn is_known_root(&self, root: &[u8; 32]) -> bool;
}

/// In-memory known-root set (append-only)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownRoots {
    roots: BTreeSet<[u8; 32]>,
}

impl KnownRoots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl RootSink for KnownRoots {
    fn record_root(&mut self, root: [u8; 32]) -> Result<()> {
        self.roots.insert(root);
        Ok(())
    }
}

impl RootHistory for KnownRoots {
    fn is_known_root(&self, root: &[u8; 32]) -> bool {
        self.roots.contains(root)
    }
}

/// Compute zero values for levels `0..=depth`.
///
/// zeros[0] = hash_to_field(domain_seed)
/// zeros[i] = hash(zeros[i-1], zeros[i-1])
/// zeros[depth] is the root of the empty tree.
pub fn zero_values<H: FieldHasher>(
    hasher: &H,
    depth: u8,
    domain_seed: &[u8],
) -> Result<Vec<[u8; 32]>> {
    let mut zeros = Vec::with_capacity(depth as usize + 1);
    zeros.push(hash_to_field(&[domain_seed]));
    for level in 1..=depth as usize {
        let prev = zeros[level - 1];
        zeros.push(hasher.hash_pair(&prev, &prev)?);
    }
    Ok(zeros)
}

/// Incremental Merkle tree state.
///
/// Stored inline in `CommitmentTreeAccount`; only the first `depth` entries of
/// `filled_subtrees` and `zeros` are meaningful.
#[zero_copy]
pub struct IncrementalMerkleTree {
    /// Tree depth (immutable after init)
    pub depth: u8,
    pub _padding: [u8; 7],

    /// Next leaf index to be filled (also = total leaves inserted)
    pub next_index: u64,

    /// Current root hash
    pub root: [u8; 32],

    /// Rightmost left-child hash per level
    pub filled_subtrees: [[u8; 32]; MAX_MERKLE_DEPTH as usize],

    /// Empty-subtree hash per level
    pub zeros: [[u8; 32]; MAX_MERKLE_DEPTH as usize],
}

impl IncrementalMerkleTree {
    pub fn new<H: FieldHasher>(hasher: &H, depth: u8, domain_seed: &[u8]) -> Result<Self> {
        let mut tree: Self = bytemuck::Zeroable::zeroed();
        tree.initialize(hasher, depth, domain_seed)?;
        Ok(tree)
    }

    /// Reset to the empty tree of `depth` levels.
    pub fn initialize<H: FieldHasher>(
        &mut self,
        hasher: &H,
        depth: u8,
        domain_seed: &[u8],
    ) -> Result<()> {
        require!(
            depth > 0 && depth <= MAX_MERKLE_DEPTH,
            PrivacyPoolError::InvalidMerkleDepth
        );

        let zeros = zero_values(hasher, depth, domain_seed)?;

        self.depth = depth;
        self._padding = [0u8; 7];
        self.next_index = 0;
        self.filled_subtrees = [[0u8; 32]; MAX_MERKLE_DEPTH as usize];
        self.zeros = [[0u8; 32]; MAX_MERKLE_DEPTH as usize];
        for level in 0..depth as usize {
            self.zeros[level] = zeros[level];
            self.filled_subtrees[level] = zeros[level];
        }
        self.root = zeros[depth as usize];

        Ok(())
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn remaining(&self) -> u64 {
        self.capacity().saturating_sub(self.next_index)
    }

    pub fn is_full(&self) -> bool {
        self.next_index >= self.capacity()
    }

    /// Root of the tree with no leaves.
    pub fn empty_root<H: FieldHasher>(&self, hasher: &H) -> Result<[u8; 32]> {
        let top = self.depth as usize - 1;
        hasher.hash_pair(&self.zeros[top], &self.zeros[top])
    }

    /// Append one leaf, record the new root, and return the leaf index.
    ///
    /// The tree is only updated once the root has been recorded.
    pub fn insert<H: FieldHasher, R: RootSink>(
        &mut self,
        hasher: &H,
        leaf: [u8; 32],
        roots: &mut R,
    ) -> Result<u64> {
        require!(!self.is_full(), PrivacyPoolError::MerkleTreeCapacity);

        let mut next = *self;
        let index = next.append(hasher, leaf)?;
        roots.record_root(next.root)?;
        *self = next;

        Ok(index)
    }

    /// Append a batch of leaves as one accounting step.
    ///
    /// Produces the same tree state as inserting the leaves one by one, but
    /// hashes level by level and records only the final root. Unlike
    /// sequential inserts, the intermediate roots inside the batch never
    /// become known roots. Returns the index of the first leaf.
    pub fn insert_many<H: FieldHasher, R: RootSink>(
        &mut self,
        hasher: &H,
        leaves: &[[u8; 32]],
        roots: &mut R,
    ) -> Result<u64> {
        require!(!leaves.is_empty(), PrivacyPoolError::EmptyBatch);
        require!(
            leaves.len() as u64 <= self.remaining(),
            PrivacyPoolError::MerkleTreeCapacity
        );

        let mut next = *self;
        let first = next.append_batch(hasher, leaves)?;
        roots.record_root(next.root)?;
        *self = next;

        Ok(first)
    }

    fn append<H: FieldHasher>(&mut self, hasher: &H, leaf: [u8; 32]) -> Result<u64> {
        let leaf_index = self.next_index;
        let mut current_hash = leaf;
        let mut current_index = leaf_index;

        for level in 0..self.depth as usize {
            if current_index & 1 == 1 {
                // Right child: left sibling is the cached filled subtree
                current_hash = hasher.hash_pair(&self.filled_subtrees[level], &current_hash)?;
            } else {
                // Left child: cache it, right sibling is empty
                self.filled_subtrees[level] = current_hash;
                current_hash = hasher.hash_pair(&current_hash, &self.zeros[level])?;
            }
            current_index >>= 1;
        }

        self.root = current_hash;
        self.next_index += 1;

        Ok(leaf_index)
    }

    fn append_batch<H: FieldHasher>(&mut self, hasher: &H, leaves: &[[u8; 32]]) -> Result<u64> {
        let first = self.next_index;

        // `layer` holds the nodes at indices start..=last of the current level
        let mut layer = leaves.to_vec();
        let mut start = first;

        for level in 0..self.depth as usize {
            let last = start + layer.len() as u64 - 1;
            let node = |index: u64| layer[(index - start) as usize];

            let mut parents = Vec::with_capacity(((last >> 1) - (start >> 1) + 1) as usize);
            for parent in (start >> 1)..=(last >> 1) {
                let left_index = parent << 1;
                let right_index = left_index + 1;
                let left = if left_index >= start {
                    node(left_index)
                } else {
                    self.filled_subtrees[level]
                };
                let right = if right_index <= last {
                    node(right_index)
                } else {
                    self.zeros[level]
                };
                parents.push(hasher.hash_pair(&left, &right)?);
            }

            // Rightmost left child at this level; untouched if it predates the batch
            if last & 1 == 0 {
                self.filled_subtrees[level] = node(last);
            } else if last - 1 >= start {
                self.filled_subtrees[level] = node(last - 1);
            }

            layer = parents;
            start >>= 1;
        }

        self.root = layer[0];
        self.next_index = first + leaves.len() as u64;

        Ok(first)
    }
}
