//! Full-leaf Merkle tree mirror.
//!
//! Keeps every written node so it can serve inclusion paths and in-place
//! leaf updates. Clients mirror the on-chain commitment tree with it, and
//! access lists are built on top of it. Never stored on-chain.

use anchor_lang::prelude::*;

use crate::constants::MAX_MERKLE_DEPTH;
use crate::errors::PrivacyPoolError;
use crate::field::is_canonical;
use crate::hasher::FieldHasher;
use crate::merkle::zero_values;

/// Inclusion path from a leaf up to `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    /// Sibling hash per level, leaf level first
    pub siblings: Vec<[u8; 32]>,
    /// 0 when the path node is a left child, 1 when it is a right child
    pub path_indices: Vec<u8>,
    pub root: [u8; 32],
}

impl MerklePath {
    /// Fold `leaf` up the path.
    pub fn compute_root<H: FieldHasher>(&self, hasher: &H, leaf: &[u8; 32]) -> Result<[u8; 32]> {
        self.siblings
            .iter()
            .zip(self.path_indices.iter())
            .try_fold(*leaf, |node, (sibling, side)| {
                if *side == 0 {
                    hasher.hash_pair(&node, sibling)
                } else {
                    hasher.hash_pair(sibling, &node)
                }
            })
    }

    /// Check that `leaf` sits at `index` under `root`.
    pub fn verify<H: FieldHasher>(
        &self,
        hasher: &H,
        leaf: &[u8; 32],
        index: u64,
        root: &[u8; 32],
    ) -> bool {
        if self.siblings.len() != self.path_indices.len() || self.siblings.len() > 64 {
            return false;
        }
        let bits_match = self
            .path_indices
            .iter()
            .enumerate()
            .all(|(level, side)| u64::from(*side) == (index >> level) & 1);
        let in_range = self.siblings.len() == 64 || index >> self.siblings.len() == 0;

        bits_match
            && in_range
            && self
                .compute_root(hasher, leaf)
                .map(|computed| computed == *root)
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct LeafTree<H: FieldHasher> {
    hasher: H,
    depth: u8,
    zeros: Vec<[u8; 32]>,
    /// layers[0] holds the leaves, layers[depth] the root once anything is written
    layers: Vec<Vec<[u8; 32]>>,
}

impl<H: FieldHasher> LeafTree<H> {
    pub fn new(hasher: H, depth: u8, domain_seed: &[u8]) -> Result<Self> {
        require!(
            depth > 0 && depth <= MAX_MERKLE_DEPTH,
            PrivacyPoolError::InvalidMerkleDepth
        );

        Ok(Self {
            zeros: zero_values(&hasher, depth, domain_seed)?,
            hasher,
            depth,
            layers: vec![Vec::new(); depth as usize + 1],
        })
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of written leaves
    pub fn len(&self) -> u64 {
        self.layers[0].len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    /// Leaf value of an empty slot
    pub fn default_leaf(&self) -> [u8; 32] {
        self.zeros[0]
    }

    pub fn leaf(&self, index: u64) -> Option<[u8; 32]> {
        self.layers[0].get(index as usize).copied()
    }

    pub fn leaves(&self) -> &[[u8; 32]] {
        &self.layers[0]
    }

    pub fn root(&self) -> [u8; 32] {
        self.node(self.depth as usize, 0)
    }

    pub fn insert(&mut self, leaf: [u8; 32]) -> Result<u64> {
        require!(
            self.len() < self.capacity(),
            PrivacyPoolError::MerkleTreeCapacity
        );
        require!(
            is_canonical(&leaf),
            PrivacyPoolError::FieldElementNotCanonical
        );

        let index = self.len();
        self.layers[0].push(leaf);
        self.refresh(index)?;

        Ok(index)
    }

    /// Append a batch; returns the index of the first leaf.
    pub fn insert_many(&mut self, leaves: &[[u8; 32]]) -> Result<u64> {
        require!(!leaves.is_empty(), PrivacyPoolError::EmptyBatch);
        require!(
            leaves.len() as u64 <= self.capacity() - self.len(),
            PrivacyPoolError::MerkleTreeCapacity
        );
        require!(
            leaves.iter().all(is_canonical),
            PrivacyPoolError::FieldElementNotCanonical
        );

        let first = self.len();
        self.layers[0].extend_from_slice(leaves);
        for index in first..self.len() {
            self.refresh(index)?;
        }

        Ok(first)
    }

    /// Overwrite a written leaf and recompute its path.
    pub fn update(&mut self, index: u64, leaf: [u8; 32]) -> Result<()> {
        require!(index < self.len(), PrivacyPoolError::LeafIndexOutOfRange);
        require!(
            is_canonical(&leaf),
            PrivacyPoolError::FieldElementNotCanonical
        );

        self.layers[0][index as usize] = leaf;
        self.refresh(index)?;

        Ok(())
    }

    pub fn path_of(&self, index: u64) -> Result<MerklePath> {
        require!(index < self.len(), PrivacyPoolError::LeafIndexOutOfRange);

        let mut siblings = Vec::with_capacity(self.depth as usize);
        let mut path_indices = Vec::with_capacity(self.depth as usize);
        let mut current = index;

        for level in 0..self.depth as usize {
            siblings.push(self.node(level, current ^ 1));
            path_indices.push((current & 1) as u8);
            current >>= 1;
        }

        Ok(MerklePath {
            siblings,
            path_indices,
            root: self.root(),
        })
    }

    fn node(&self, level: usize, index: u64) -> [u8; 32] {
        self.layers[level]
            .get(index as usize)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Leaves are checked canonical before they are written, so hashing here
    /// cannot fail on their account.
    fn refresh(&mut self, index: u64) -> Result<()> {
        let mut current = index;

        for level in 0..self.depth as usize {
            let parent = current >> 1;
            let hash = self
                .hasher
                .hash_pair(&self.node(level, parent << 1), &self.node(level, (parent << 1) | 1))?;

            // Leaves are appended in order, so a parent is either known or next
            let above = &mut self.layers[level + 1];
            if parent as usize == above.len() {
                above.push(hash);
            } else {
                above[parent as usize] = hash;
            }
            current = parent;
        }

        Ok(())
    }
}
