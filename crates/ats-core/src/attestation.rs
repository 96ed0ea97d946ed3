//! Attestation type definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A semantic claim binding subjects, predicates, contexts, and actors at a
/// timestamp, with an origin source and mutable attributes.
///
/// Identity is defined by `subjects`, `predicates`, `contexts`, `actors`,
/// `timestamp`, and `source` — see [`crate::content_hash`]. `id`,
/// `attributes`, and `created_at` are storage/local artifacts and never
/// affect content identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Locally assigned identifier (ASID), e.g. `"AS-<uuid>"`.
    pub id: String,

    /// Entities the attestation is about.
    pub subjects: Vec<String>,

    /// What is being claimed.
    pub predicates: Vec<String>,

    /// Context for the claim, e.g. `"team-eng"`.
    pub contexts: Vec<String>,

    /// Who made the attestation.
    pub actors: Vec<String>,

    /// Logical claim time, Unix epoch nanoseconds.
    pub timestamp: i64,

    /// Origin tag, e.g. `"cli"`, `"api"`.
    pub source: String,

    /// Mutable metadata. Not part of identity.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Local insertion time, Unix epoch nanoseconds. Not part of identity.
    #[serde(default)]
    pub created_at: i64,
}

impl Default for Attestation {
    fn default() -> Self {
        Self {
            id: String::new(),
            subjects: Vec::new(),
            predicates: Vec::new(),
            contexts: Vec::new(),
            actors: Vec::new(),
            timestamp: 0,
            source: String::new(),
            attributes: HashMap::new(),
            created_at: 0,
        }
    }
}

impl Attestation {
    /// Group keys (actor, context) this attestation belongs to. An
    /// attestation with A actors and C contexts belongs to A×C groups.
    pub fn group_keys(&self) -> Vec<crate::merkle::GroupKey> {
        let mut keys = Vec::with_capacity(self.actors.len() * self.contexts.len());
        for actor in &self.actors {
            for context in &self.contexts {
                keys.push(crate::merkle::GroupKey {
                    actor: actor.clone(),
                    context: context.clone(),
                });
            }
        }
        keys
    }
}

/// Builder for creating attestations.
#[derive(Debug, Default)]
pub struct AttestationBuilder {
    attestation: Attestation,
}

impl AttestationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.attestation.id = id.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.attestation.subjects.push(subject.into());
        self
    }

    pub fn subjects(mut self, subjects: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attestation
            .subjects
            .extend(subjects.into_iter().map(|s| s.into()));
        self
    }

    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.attestation.predicates.push(predicate.into());
        self
    }

    pub fn predicates(mut self, predicates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attestation
            .predicates
            .extend(predicates.into_iter().map(|s| s.into()));
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.attestation.contexts.push(context.into());
        self
    }

    pub fn contexts(mut self, contexts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attestation
            .contexts
            .extend(contexts.into_iter().map(|s| s.into()));
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.attestation.actors.push(actor.into());
        self
    }

    pub fn actors(mut self, actors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.attestation
            .actors
            .extend(actors.into_iter().map(|s| s.into()));
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.attestation.timestamp = timestamp;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.attestation.source = source.into();
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attestation.attributes.insert(key.into(), value);
        self
    }

    pub fn created_at(mut self, created_at: i64) -> Self {
        self.attestation.created_at = created_at;
        self
    }

    pub fn build(self) -> Attestation {
        self.attestation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_roundtrip() {
        let a = AttestationBuilder::new()
            .id("AS-test-123")
            .subject("user-1")
            .predicate("member")
            .context("team-eng")
            .actor("hr-system")
            .source("cli")
            .timestamp(1_718_452_800_000_000_000)
            .build();

        assert_eq!(a.id, "AS-test-123");
        assert_eq!(a.subjects, vec!["user-1"]);
        assert_eq!(a.predicates, vec!["member"]);
        assert_eq!(a.contexts, vec!["team-eng"]);
        assert_eq!(a.actors, vec!["hr-system"]);
    }

    #[test]
    fn group_keys_are_the_cartesian_product() {
        let a = AttestationBuilder::new()
            .subject("s")
            .actors(["a1", "a2"])
            .contexts(["c1", "c2", "c3"])
            .build();

        assert_eq!(a.group_keys().len(), 6);
    }

    #[test]
    fn attributes_and_created_at_not_part_of_default_equality_shape() {
        let a = Attestation::default();
        assert!(a.attributes.is_empty());
        assert_eq!(a.created_at, 0);
    }
}
