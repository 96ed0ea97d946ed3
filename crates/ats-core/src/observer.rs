//! Observer hook invoked whenever an attestation store's contents change.
//!
//! Keeping the Merkle tree in sync with a store is not the store's job —
//! it's injected as an observer, keeping indexing concerns out of
//! `AttestationStore` itself.

use std::collections::BTreeMap;

use crate::attestation::Attestation;
use crate::content_hash::{content_hash, ContentHash};
use crate::merkle::{GroupKey, MerkleDiff, MerkleTree};

/// Receives attestation lifecycle events from a store.
pub trait AttestationObserver: Send + Sync {
    fn on_insert(&self, attestation: &Attestation);
    fn on_remove(&self, attestation: &Attestation);
}

/// Keeps a [`MerkleTree`] up to date as attestations are inserted into or
/// removed from a store.
pub struct MerkleObserver {
    tree: parking_lot::RwLock<MerkleTree>,
}

impl MerkleObserver {
    pub fn new() -> Self {
        Self {
            tree: parking_lot::RwLock::new(MerkleTree::new()),
        }
    }

    pub fn root(&self) -> crate::content_hash::ContentHash {
        self.tree.write().root()
    }

    pub fn with_tree<R>(&self, f: impl FnOnce(&mut MerkleTree) -> R) -> R {
        f(&mut self.tree.write())
    }

    /// `{group_key_digest -> group_digest}` over all non-empty groups, for
    /// sending in a `group_hashes` wire message.
    pub fn group_hashes(&self) -> BTreeMap<ContentHash, ContentHash> {
        self.tree.write().group_hashes()
    }

    /// Diff this tree's groups against a remote's `group_hashes` map.
    pub fn diff(&self, remote: &BTreeMap<ContentHash, ContentHash>) -> MerkleDiff {
        self.tree.write().diff(remote)
    }

    /// Resolve a group-key digest to its `(actor, context)` pair, if this
    /// tree recognizes it.
    pub fn find_group_key(&self, group_digest: &ContentHash) -> Option<GroupKey> {
        self.tree.read().find_group_key(group_digest).cloned()
    }
}

impl Default for MerkleObserver {
    fn default() -> Self {
        Self::new()
    }
}

/// A store that exposes the Merkle tree mirroring its contents, so a sync
/// peer can read group digests directly off the store rather than keeping
/// a second copy in step.
pub trait MerkleBacked {
    fn tree(&self) -> &MerkleObserver;
}

impl AttestationObserver for MerkleObserver {
    fn on_insert(&self, attestation: &Attestation) {
        let leaf = content_hash(attestation);
        let mut tree = self.tree.write();
        for key in attestation.group_keys() {
            tree.insert(key, leaf);
        }
    }

    fn on_remove(&self, attestation: &Attestation) {
        let leaf = content_hash(attestation);
        let mut tree = self.tree.write();
        for key in attestation.group_keys() {
            tree.remove(&key, &leaf);
        }
    }
}
