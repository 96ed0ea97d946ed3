//! Two-level Merkle state digest over (actor, context) groups.
//!
//! Each group's leaves are the content hashes of the attestations that
//! belong to it; the root digest folds all group digests together in
//! sorted order. Recomputation is lazy: inserts and removes mark the
//! affected group (and the root) dirty, and the hash is only recomputed
//! on the next read.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use crate::content_hash::ContentHash;

/// An (actor, context) pair identifying one leaf group of the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub actor: String,
    pub context: String,
}

impl GroupKey {
    pub fn new(actor: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            context: context.into(),
        }
    }

    /// The group-key digest used as this group's wire identifier:
    /// `SHA256("gk:" || actor || "\0" || context)`.
    pub fn digest(&self) -> ContentHash {
        let mut h = Sha256::new();
        h.update(b"gk:");
        h.update(self.actor.as_bytes());
        h.update(b"\0");
        h.update(self.context.as_bytes());
        h.finalize().into()
    }
}

#[derive(Debug, Clone)]
struct Group {
    key: GroupKey,
    leaves: BTreeSet<ContentHash>,
    dirty: bool,
    hash: ContentHash,
}

impl Group {
    fn new(key: GroupKey) -> Self {
        Self {
            key,
            leaves: BTreeSet::new(),
            dirty: true,
            hash: [0u8; 32],
        }
    }

    fn recompute(&mut self) -> ContentHash {
        if self.dirty {
            let mut h = Sha256::new();
            h.update(b"grp:");
            h.update(self.key.actor.as_bytes());
            h.update(b"\0");
            h.update(self.key.context.as_bytes());
            h.update(b"\0");
            for leaf in &self.leaves {
                h.update(leaf);
            }
            self.hash = h.finalize().into();
            self.dirty = false;
        }
        self.hash
    }
}

/// Result of comparing two Merkle trees' group digests. Each list holds
/// group-key digests (`SHA256("gk:" || actor || "\0" || context)`), not
/// resolved `GroupKey`s — the wire protocol exchanges groups by digest, and
/// a `remote_only` digest has no local `GroupKey` to resolve it against.
/// Callers that need the actual key for a `local_only`/`divergent` entry
/// use [`MerkleTree::find_group_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleDiff {
    pub local_only: Vec<ContentHash>,
    pub remote_only: Vec<ContentHash>,
    pub divergent: Vec<ContentHash>,
}

impl MerkleDiff {
    pub fn is_empty(&self) -> bool {
        self.local_only.is_empty() && self.remote_only.is_empty() && self.divergent.is_empty()
    }
}

/// A two-level Merkle digest: leaves (content hashes) inside groups
/// (actor, context), groups inside a root.
#[derive(Debug, Clone, Default)]
pub struct MerkleTree {
    groups: BTreeMap<GroupKey, Group>,
    dirty: bool,
    root: ContentHash,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
            dirty: true,
            root: [0u8; 32],
        }
    }

    /// Insert a leaf into a group. Idempotent: inserting the same leaf
    /// twice is a no-op past the first time.
    pub fn insert(&mut self, key: GroupKey, leaf: ContentHash) {
        let group = self
            .groups
            .entry(key.clone())
            .or_insert_with(|| Group::new(key));
        if group.leaves.insert(leaf) {
            group.dirty = true;
            self.dirty = true;
        }
    }

    /// Remove a leaf from a group. Drops the group entirely once it's
    /// empty, so group count reflects only groups with live data.
    pub fn remove(&mut self, key: &GroupKey, leaf: &ContentHash) {
        if let Some(group) = self.groups.get_mut(key) {
            if group.leaves.remove(leaf) {
                group.dirty = true;
                self.dirty = true;
                if group.leaves.is_empty() {
                    self.groups.remove(key);
                }
            }
        }
    }

    pub fn contains(&self, key: &GroupKey, leaf: &ContentHash) -> bool {
        self.groups
            .get(key)
            .map(|g| g.leaves.contains(leaf))
            .unwrap_or(false)
    }

    /// Root digest, recomputed lazily over all group digests in key order.
    pub fn root(&mut self) -> ContentHash {
        if self.dirty || self.groups.values().any(|g| g.dirty) {
            let mut h = Sha256::new();
            h.update(b"root:");
            for group in self.groups.values_mut() {
                h.update(group.recompute());
            }
            self.root = h.finalize().into();
            self.dirty = false;
        }
        self.root
    }

    /// Per-group digests, keyed by group digest (not `GroupKey` — this is
    /// what gets exchanged over the wire, since the remote peer shouldn't
    /// need to already know our group keys to compare).
    pub fn group_hashes(&mut self) -> BTreeMap<ContentHash, ContentHash> {
        let mut out = BTreeMap::new();
        for group in self.groups.values_mut() {
            out.insert(group.key.digest(), group.recompute());
        }
        out
    }

    /// Reverse-lookup a `GroupKey` from its digest. `O(n)` in group count;
    /// used only when handling a remote's `need` list, which is bounded by
    /// the soft caps in `ats-sync`'s `SyncConfig`.
    pub fn find_group_key(&self, group_digest: &ContentHash) -> Option<&GroupKey> {
        self.groups
            .keys()
            .find(|key| &key.digest() == group_digest)
    }

    /// Compare this tree's group digests against a remote's
    /// `{group_key_digest -> group_digest}` map, classifying each
    /// differing group-key digest as local-only, remote-only, or
    /// divergent.
    pub fn diff(&mut self, remote: &BTreeMap<ContentHash, ContentHash>) -> MerkleDiff {
        let local = self.group_hashes();
        let mut out = MerkleDiff::default();

        for (group_digest, hash) in &local {
            match remote.get(group_digest) {
                None => out.local_only.push(*group_digest),
                Some(remote_hash) if remote_hash != hash => out.divergent.push(*group_digest),
                _ => {}
            }
        }

        for group_digest in remote.keys() {
            if !local.contains_key(group_digest) {
                out.remote_only.push(*group_digest);
            }
        }

        out
    }

    pub fn size(&self) -> usize {
        self.groups.values().map(|g| g.leaves.len()).sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(byte: u8) -> ContentHash {
        [byte; 32]
    }

    #[test]
    fn empty_tree_has_a_stable_root() {
        let mut t1 = MerkleTree::new();
        let mut t2 = MerkleTree::new();
        assert_eq!(t1.root(), t2.root());
    }

    #[test]
    fn insert_changes_root_deterministically() {
        let key = GroupKey::new("actor-1", "ctx-1");

        let mut t1 = MerkleTree::new();
        t1.insert(key.clone(), leaf(1));
        t1.insert(key.clone(), leaf(2));

        let mut t2 = MerkleTree::new();
        t2.insert(key.clone(), leaf(2));
        t2.insert(key, leaf(1));

        assert_eq!(t1.root(), t2.root());
    }

    #[test]
    fn duplicate_insert_is_idempotent() {
        let key = GroupKey::new("a", "c");
        let mut t1 = MerkleTree::new();
        t1.insert(key.clone(), leaf(9));
        let once = t1.root();

        t1.insert(key, leaf(9));
        assert_eq!(t1.root(), once);
    }

    #[test]
    fn remove_restores_prior_root() {
        let key = GroupKey::new("a", "c");
        let mut t = MerkleTree::new();
        let empty_root = t.root();

        t.insert(key.clone(), leaf(5));
        assert_ne!(t.root(), empty_root);

        t.remove(&key, &leaf(5));
        assert_eq!(t.root(), empty_root);
    }

    #[test]
    fn empty_group_is_dropped() {
        let key = GroupKey::new("a", "c");
        let mut t = MerkleTree::new();
        t.insert(key.clone(), leaf(1));
        assert_eq!(t.group_count(), 1);

        t.remove(&key, &leaf(1));
        assert_eq!(t.group_count(), 0);
    }

    #[test]
    fn different_group_key_changes_root_even_with_same_leaves() {
        let mut t1 = MerkleTree::new();
        t1.insert(GroupKey::new("a", "c"), leaf(1));

        let mut t2 = MerkleTree::new();
        t2.insert(GroupKey::new("b", "c"), leaf(1));

        assert_ne!(t1.root(), t2.root());
    }

    #[test]
    fn diff_classifies_local_only() {
        let key = GroupKey::new("a", "c");
        let mut local = MerkleTree::new();
        local.insert(key.clone(), leaf(1));

        let remote = BTreeMap::new();
        let diff = local.diff(&remote);

        assert_eq!(diff.local_only, vec![key.digest()]);
        assert!(diff.remote_only.is_empty());
        assert!(diff.divergent.is_empty());
    }

    #[test]
    fn diff_classifies_remote_only() {
        let key = GroupKey::new("a", "c");
        let mut local = MerkleTree::new();

        let mut remote_tree = MerkleTree::new();
        remote_tree.insert(key.clone(), leaf(1));
        let remote = remote_tree.group_hashes();

        let diff = local.diff(&remote);
        assert_eq!(diff.remote_only, vec![key.digest()]);
        assert!(diff.local_only.is_empty());
        assert!(diff.divergent.is_empty());
    }

    #[test]
    fn diff_classifies_divergent() {
        let key = GroupKey::new("a", "c");
        let mut local = MerkleTree::new();
        local.insert(key.clone(), leaf(1));

        let mut remote_tree = MerkleTree::new();
        remote_tree.insert(key.clone(), leaf(2));
        let remote = remote_tree.group_hashes();

        let diff = local.diff(&remote);
        assert_eq!(diff.divergent, vec![key.digest()]);
    }

    #[test]
    fn diff_of_identical_trees_is_empty() {
        let mut local = MerkleTree::new();
        local.insert(GroupKey::new("a", "c"), leaf(1));

        let mut remote_tree = MerkleTree::new();
        remote_tree.insert(GroupKey::new("a", "c"), leaf(1));
        let remote = remote_tree.group_hashes();

        assert!(local.diff(&remote).is_empty());
    }

    #[test]
    fn find_group_key_reverse_lookup() {
        let key = GroupKey::new("actor-x", "ctx-y");
        let mut t = MerkleTree::new();
        t.insert(key.clone(), leaf(1));

        let digest = key.digest();
        assert_eq!(t.find_group_key(&digest), Some(&key));
    }

    #[test]
    fn contains_reflects_current_membership() {
        let key = GroupKey::new("a", "c");
        let mut t = MerkleTree::new();
        assert!(!t.contains(&key, &leaf(1)));

        t.insert(key.clone(), leaf(1));
        assert!(t.contains(&key, &leaf(1)));

        t.remove(&key, &leaf(1));
        assert!(!t.contains(&key, &leaf(1)));
    }

    #[test]
    fn size_counts_leaves_across_groups() {
        let mut t = MerkleTree::new();
        t.insert(GroupKey::new("a", "c1"), leaf(1));
        t.insert(GroupKey::new("a", "c2"), leaf(2));
        t.insert(GroupKey::new("a", "c2"), leaf(3));
        assert_eq!(t.size(), 3);
        assert_eq!(t.group_count(), 2);
    }
}
