//! Storage trait definitions.

use crate::attestation::Attestation;
use crate::storage::error::StoreResult;

/// Filter for [`AttestationStore::query`]. An attestation matches if it has
/// at least one actor in `actors` (when non-empty) **and** at least one
/// context in `contexts` (when non-empty) — set intersection, not exact
/// match.
#[derive(Debug, Clone, Default)]
pub struct AttestationQuery {
    pub actors: Vec<String>,
    pub contexts: Vec<String>,
}

impl AttestationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actors.push(actor.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.contexts.push(context.into());
        self
    }

    pub(crate) fn matches(&self, a: &Attestation) -> bool {
        let actor_ok = self.actors.is_empty() || a.actors.iter().any(|x| self.actors.contains(x));
        let context_ok =
            self.contexts.is_empty() || a.contexts.iter().any(|x| self.contexts.contains(x));
        actor_ok && context_ok
    }
}

/// Core storage operations for attestations.
///
/// Designed to work across backends: in-memory (testing), SQLite
/// (`ats-sqlite`), or whatever a host embeds this crate into.
pub trait AttestationStore {
    /// Atomically insert an attestation. If an attestation with the same
    /// `id` already exists, returns `StoreError::AlreadyExists`.
    ///
    /// Implementations run bounded-storage enforcement and notify the
    /// observer as part of this call — see `crate::bounded::Enforcer` and
    /// `crate::observer::AttestationObserver`.
    fn create(&mut self, attestation: Attestation) -> StoreResult<()>;

    /// Retrieve an attestation by ID. Returns `None` if not found.
    fn get(&self, id: &str) -> StoreResult<Option<Attestation>>;

    /// Check if an attestation exists.
    fn exists(&self, id: &str) -> StoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Delete an attestation by ID. Returns `true` if it existed.
    fn delete(&mut self, id: &str) -> StoreResult<bool>;

    /// All attestations matching the query's actor/context intersection.
    fn query(&self, query: &AttestationQuery) -> StoreResult<Vec<Attestation>>;

    /// All attestation IDs.
    fn ids(&self) -> StoreResult<Vec<String>>;

    /// Total count of attestations.
    fn count(&self) -> StoreResult<usize> {
        Ok(self.ids()?.len())
    }
}
