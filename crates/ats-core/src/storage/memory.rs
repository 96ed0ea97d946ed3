//! In-memory attestation store, used for testing and as the reference
//! implementation of [`AttestationStore`].

use std::collections::HashMap;

use crate::attestation::Attestation;
use crate::bounded::{Enforcer, StorageEvent};
use crate::observer::{AttestationObserver, MerkleBacked, MerkleObserver};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::traits::{AttestationQuery, AttestationStore};

/// `HashMap`-backed store. Wires together the observer (keeps the Merkle
/// tree mirrored) and the enforcer (evicts surplus on insert) the way a
/// host is expected to: both run inside `create`, in that order.
pub struct MemoryStore {
    data: HashMap<String, Attestation>,
    tree: MerkleObserver,
    enforcer: Enforcer,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            tree: MerkleObserver::new(),
            enforcer: Enforcer::new(Default::default()),
        }
    }

    pub fn with_enforcer(enforcer: Enforcer) -> Self {
        Self {
            data: HashMap::new(),
            tree: MerkleObserver::new(),
            enforcer,
        }
    }

    /// The Merkle observer mirroring this store's contents.
    pub fn tree(&self) -> &MerkleObserver {
        &self.tree
    }

    /// Insert without running the observer or enforcer. Used to rebuild a
    /// store from a durable backend on startup, and in tests that want to
    /// seed state directly.
    pub fn insert_raw(&mut self, attestation: Attestation) {
        self.data.insert(attestation.id.clone(), attestation);
    }

    /// Run the enforcer for `new_attestation` and report the resulting
    /// events without inserting anything new. Exposed for callers that
    /// rebuild a store via [`MemoryStore::insert_raw`] and then want the
    /// enforcer's eviction pass applied after the fact.
    pub fn enforce(&mut self, new_attestation: &Attestation) -> StoreResult<Vec<StorageEvent>> {
        self.enforcer.enforce(
            &mut RawStoreHandle(&mut self.data),
            &self.tree,
            new_attestation,
        )
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MerkleBacked for MemoryStore {
    fn tree(&self) -> &MerkleObserver {
        &self.tree
    }
}

impl AttestationStore for MemoryStore {
    fn create(&mut self, attestation: Attestation) -> StoreResult<()> {
        if self.data.contains_key(&attestation.id) {
            return Err(StoreError::AlreadyExists(attestation.id));
        }

        self.tree.on_insert(&attestation);
        self.data.insert(attestation.id.clone(), attestation.clone());

        self.enforcer.enforce(
            &mut RawStoreHandle(&mut self.data),
            &self.tree,
            &attestation,
        )?;

        Ok(())
    }

    fn get(&self, id: &str) -> StoreResult<Option<Attestation>> {
        Ok(self.data.get(id).cloned())
    }

    fn delete(&mut self, id: &str) -> StoreResult<bool> {
        Ok(self.data.remove(id).is_some())
    }

    fn query(&self, query: &AttestationQuery) -> StoreResult<Vec<Attestation>> {
        Ok(self
            .data
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect())
    }

    fn ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.data.keys().cloned().collect())
    }
}

/// Adapts the raw `HashMap` behind `&mut` to [`AttestationStore`] so the
/// enforcer — which only knows the trait — can scan and delete without
/// borrowing `MemoryStore::tree` at the same time it borrows `data`.
struct RawStoreHandle<'a>(&'a mut HashMap<String, Attestation>);

impl AttestationStore for RawStoreHandle<'_> {
    fn create(&mut self, attestation: Attestation) -> StoreResult<()> {
        self.0.insert(attestation.id.clone(), attestation);
        Ok(())
    }

    fn get(&self, id: &str) -> StoreResult<Option<Attestation>> {
        Ok(self.0.get(id).cloned())
    }

    fn delete(&mut self, id: &str) -> StoreResult<bool> {
        Ok(self.0.remove(id).is_some())
    }

    fn query(&self, query: &AttestationQuery) -> StoreResult<Vec<Attestation>> {
        Ok(self.0.values().filter(|a| query.matches(a)).cloned().collect())
    }

    fn ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.0.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::AttestationBuilder;

    fn sample(id: &str) -> Attestation {
        AttestationBuilder::new()
            .id(id)
            .subject("user-1")
            .predicate("member")
            .context("team-eng")
            .actor("hr-system")
            .source("cli")
            .timestamp(1)
            .build()
    }

    #[test]
    fn create_then_get_roundtrips() {
        let mut store = MemoryStore::new();
        store.create(sample("as-1")).unwrap();
        assert_eq!(store.get("as-1").unwrap().unwrap().id, "as-1");
    }

    #[test]
    fn create_duplicate_id_errors() {
        let mut store = MemoryStore::new();
        store.create(sample("as-1")).unwrap();
        let err = store.create(sample("as-1")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn create_mirrors_into_the_merkle_tree() {
        let mut store = MemoryStore::new();
        let empty_root = store.tree().root();

        store.create(sample("as-1")).unwrap();
        assert_ne!(store.tree().root(), empty_root);
    }

    #[test]
    fn query_intersects_actor_and_context() {
        let mut store = MemoryStore::new();
        store.create(sample("as-1")).unwrap();

        let hit = AttestationQuery::new().actor("hr-system").context("team-eng");
        assert_eq!(store.query(&hit).unwrap().len(), 1);

        let miss = AttestationQuery::new().actor("hr-system").context("other");
        assert_eq!(store.query(&miss).unwrap().len(), 0);
    }

    #[test]
    fn delete_removes_from_store() {
        let mut store = MemoryStore::new();
        store.create(sample("as-1")).unwrap();
        assert!(store.delete("as-1").unwrap());
        assert!(!store.exists("as-1").unwrap());
    }

    #[test]
    fn enforcement_runs_inside_create() {
        use crate::bounded::{Enforcer, EnforcementConfig};

        let mut store =
            MemoryStore::with_enforcer(Enforcer::new(EnforcementConfig::new(1, 64, 64)));

        let a0 = AttestationBuilder::new()
            .id("as-0")
            .subject("s")
            .actor("actor")
            .context("ctx")
            .source("cli")
            .timestamp(0)
            .build();
        let a1 = AttestationBuilder::new()
            .id("as-1")
            .subject("s")
            .actor("actor")
            .context("ctx")
            .source("cli")
            .timestamp(1)
            .build();

        store.create(a0).unwrap();
        store.create(a1).unwrap();

        assert!(!store.exists("as-0").unwrap());
        assert!(store.exists("as-1").unwrap());
    }
}
