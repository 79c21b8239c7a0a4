//! Compliance subsets over deposit indices.
//!
//! An access list is a [`LeafTree`] whose leaves are ALLOWED or BLOCKED
//! markers. Its root is the `subset_root` a withdrawer proves membership
//! against; the program itself only sees that root as a public signal.

use anchor_lang::prelude::*;

use crate::constants::{
    ACCESS_TYPE_ALLOWLIST, ACCESS_TYPE_BLOCKLIST, ALLOWED_MARKER_SEED, BLOCKED_MARKER_SEED,
};
use crate::errors::PrivacyPoolError;
use crate::field::hash_to_field;
use crate::hasher::FieldHasher;
use crate::leaf_tree::{LeafTree, MerklePath};

pub fn allowed_marker() -> [u8; 32] {
    hash_to_field(&[ALLOWED_MARKER_SEED])
}

pub fn blocked_marker() -> [u8; 32] {
    hash_to_field(&[BLOCKED_MARKER_SEED])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    /// Everything is allowed unless blocked
    BlockList,
    /// Everything is blocked unless allowed
    AllowList,
}

impl AccessType {
    pub fn code(self) -> u8 {
        match self {
            AccessType::BlockList => ACCESS_TYPE_BLOCKLIST,
            AccessType::AllowList => ACCESS_TYPE_ALLOWLIST,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            ACCESS_TYPE_BLOCKLIST => Some(AccessType::BlockList),
            ACCESS_TYPE_ALLOWLIST => Some(AccessType::AllowList),
            _ => None,
        }
    }

    /// Domain seed of the empty leaf, which doubles as the default marker
    fn default_seed(self) -> &'static [u8] {
        match self {
            AccessType::BlockList => ALLOWED_MARKER_SEED,
            AccessType::AllowList => BLOCKED_MARKER_SEED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessList<H: FieldHasher> {
    access_type: AccessType,
    tree: LeafTree<H>,
}

impl<H: FieldHasher> AccessList<H> {
    pub fn new(hasher: H, access_type: AccessType, depth: u8) -> Result<Self> {
        Ok(Self {
            access_type,
            tree: LeafTree::new(hasher, depth, access_type.default_seed())?,
        })
    }

    pub fn access_type(&self) -> AccessType {
        self.access_type
    }

    /// Number of indices written so far (the proof's `bit_length`)
    pub fn len(&self) -> u64 {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn allow(&mut self, index: u64) -> Result<()> {
        self.mark(index, allowed_marker())
    }

    pub fn block(&mut self, index: u64) -> Result<()> {
        self.mark(index, blocked_marker())
    }

    pub fn is_allowed(&self, index: u64) -> bool {
        match self.tree.leaf(index) {
            Some(marker) => marker == allowed_marker(),
            None => self.access_type == AccessType::BlockList,
        }
    }

    pub fn root(&self) -> [u8; 32] {
        self.tree.root()
    }

    pub fn path_of(&self, index: u64) -> Result<MerklePath> {
        self.tree.path_of(index)
    }

    /// Write `marker` at `index`, padding with default leaves first.
    fn mark(&mut self, index: u64, marker: [u8; 32]) -> Result<()> {
        require!(
            index < self.tree.capacity(),
            PrivacyPoolError::MerkleTreeCapacity
        );

        if index >= self.tree.len() {
            let padding = (index - self.tree.len()) as usize;
            let mut extension = vec![self.tree.default_leaf(); padding];
            extension.push(marker);
            self.tree.insert_many(&extension)?;
            return Ok(());
        }

        self.tree.update(index, marker)
    }
}
