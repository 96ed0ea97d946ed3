//! Bounded-storage enforcement.
//!
//! Runs synchronously after every successful insert and evicts the oldest
//! surplus attestations once one of three cardinality limits is exceeded,
//! emitting a [`StorageEvent`] per eviction. The insert always succeeds;
//! the enforcer cleans up after it rather than rejecting it outright.

use crate::attestation::Attestation;
use crate::observer::MerkleObserver;
use crate::storage::{AttestationStore, StoreResult};

/// Cardinality limits enforced after every insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcementConfig {
    /// Max attestations sharing one (actor, context) pair.
    pub actor_context_limit: usize,
    /// Max distinct contexts per actor.
    pub actor_contexts_limit: usize,
    /// Max distinct actors per subject.
    pub entity_actors_limit: usize,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            actor_context_limit: 16,
            actor_contexts_limit: 64,
            entity_actors_limit: 64,
        }
    }
}

impl EnforcementConfig {
    pub fn new(
        actor_context_limit: usize,
        actor_contexts_limit: usize,
        entity_actors_limit: usize,
    ) -> Self {
        Self {
            actor_context_limit,
            actor_contexts_limit,
            entity_actors_limit,
        }
    }

    /// No eviction ever triggers.
    pub fn unlimited() -> Self {
        Self {
            actor_context_limit: usize::MAX,
            actor_contexts_limit: usize::MAX,
            entity_actors_limit: usize::MAX,
        }
    }

    /// Replace any zero limit with its default, returning the warnings a
    /// caller should log. A zero limit never refuses to boot — it's
    /// silently corrected.
    pub fn sanitized(self) -> (Self, Vec<String>) {
        let defaults = Self::default();
        let mut cfg = self;
        let mut warnings = Vec::new();

        if cfg.actor_context_limit == 0 {
            warnings.push(format!(
                "actor_context_limit was 0, using default {}",
                defaults.actor_context_limit
            ));
            cfg.actor_context_limit = defaults.actor_context_limit;
        }
        if cfg.actor_contexts_limit == 0 {
            warnings.push(format!(
                "actor_contexts_limit was 0, using default {}",
                defaults.actor_contexts_limit
            ));
            cfg.actor_contexts_limit = defaults.actor_contexts_limit;
        }
        if cfg.entity_actors_limit == 0 {
            warnings.push(format!(
                "entity_actors_limit was 0, using default {}",
                defaults.entity_actors_limit
            ));
            cfg.entity_actors_limit = defaults.entity_actors_limit;
        }

        (cfg, warnings)
    }
}

/// Which limit an eviction round enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEventKind {
    ActorContextLimit,
    ActorContextsLimit,
    EntityActorsLimit,
}

/// A record of one eviction round, meant for a write-only operator sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub kind: StorageEventKind,
    pub actor: Option<String>,
    pub context: Option<String>,
    pub entity: Option<String>,
    pub deletions_count: usize,
    /// The timestamp of the attestation whose insert triggered this round.
    pub timestamp: i64,
    /// The created_at of the attestation whose insert triggered this round.
    pub created_at: i64,
}

/// Applies [`EnforcementConfig`]'s three limits after an insert.
pub struct Enforcer {
    config: EnforcementConfig,
}

impl Enforcer {
    pub fn new(config: EnforcementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> EnforcementConfig {
        self.config
    }

    /// Run all three checks against `store`/`tree` in order, evicting
    /// surplus attestations triggered by `new_attestation`'s insert.
    ///
    /// Evictions mutate `tree` directly rather than through
    /// `AttestationObserver::on_remove`, so enforcement never re-enters the
    /// observer dispatch that drove the original insert.
    pub fn enforce(
        &self,
        store: &mut dyn AttestationStore,
        tree: &MerkleObserver,
        new_attestation: &Attestation,
    ) -> StoreResult<Vec<StorageEvent>> {
        let mut events = Vec::new();

        for actor in &new_attestation.actors {
            for context in &new_attestation.contexts {
                if let Some(event) =
                    self.enforce_actor_context(store, tree, new_attestation, actor, context)?
                {
                    events.push(event);
                }
            }
        }

        for actor in &new_attestation.actors {
            if let Some(event) = self.enforce_actor_contexts(store, tree, new_attestation, actor)?
            {
                events.push(event);
            }
        }

        for subject in &new_attestation.subjects {
            if let Some(event) =
                self.enforce_entity_actors(store, tree, new_attestation, subject)?
            {
                events.push(event);
            }
        }

        Ok(events)
    }

    fn enforce_actor_context(
        &self,
        store: &mut dyn AttestationStore,
        tree: &MerkleObserver,
        trigger: &Attestation,
        actor: &str,
        context: &str,
    ) -> StoreResult<Option<StorageEvent>> {
        let mut group = snapshot(store)?
            .into_iter()
            .filter(|a| has(&a.actors, actor) && has(&a.contexts, context))
            .collect::<Vec<_>>();

        if group.len() <= self.config.actor_context_limit {
            return Ok(None);
        }

        group.sort_by_key(|a| a.timestamp);
        let surplus = group.len() - self.config.actor_context_limit;
        let victims = &group[..surplus];
        let n = evict(store, tree, victims)?;

        Ok(Some(StorageEvent {
            kind: StorageEventKind::ActorContextLimit,
            actor: Some(actor.to_string()),
            context: Some(context.to_string()),
            entity: None,
            deletions_count: n,
            timestamp: trigger.timestamp,
            created_at: trigger.created_at,
        }))
    }

    fn enforce_actor_contexts(
        &self,
        store: &mut dyn AttestationStore,
        tree: &MerkleObserver,
        trigger: &Attestation,
        actor: &str,
    ) -> StoreResult<Option<StorageEvent>> {
        let for_actor = snapshot(store)?
            .into_iter()
            .filter(|a| has(&a.actors, actor))
            .collect::<Vec<_>>();

        let oldest_contexts = oldest_surplus_keys(
            &for_actor,
            self.config.actor_contexts_limit,
            |a| a.contexts.clone(),
        );
        if oldest_contexts.is_empty() {
            return Ok(None);
        }

        let victims = for_actor
            .into_iter()
            .filter(|a| a.contexts.iter().any(|c| oldest_contexts.contains(c)))
            .collect::<Vec<_>>();
        let n = evict(store, tree, &victims)?;

        Ok(Some(StorageEvent {
            kind: StorageEventKind::ActorContextsLimit,
            actor: Some(actor.to_string()),
            context: None,
            entity: None,
            deletions_count: n,
            timestamp: trigger.timestamp,
            created_at: trigger.created_at,
        }))
    }

    fn enforce_entity_actors(
        &self,
        store: &mut dyn AttestationStore,
        tree: &MerkleObserver,
        trigger: &Attestation,
        subject: &str,
    ) -> StoreResult<Option<StorageEvent>> {
        let for_subject = snapshot(store)?
            .into_iter()
            .filter(|a| has(&a.subjects, subject))
            .collect::<Vec<_>>();

        // Self-certifying attestations (actor == the attestation's own id)
        // contribute no actor to the count and can never be picked as
        // eviction victims by this rule — see spec's self-certifying
        // pattern note.
        let oldest_actors = oldest_surplus_keys(
            &for_subject,
            self.config.entity_actors_limit,
            |a| {
                if is_self_certifying(a) {
                    Vec::new()
                } else {
                    a.actors.clone()
                }
            },
        );
        if oldest_actors.is_empty() {
            return Ok(None);
        }

        let victims = for_subject
            .into_iter()
            .filter(|a| a.actors.iter().any(|x| oldest_actors.contains(x)))
            .collect::<Vec<_>>();
        let n = evict(store, tree, &victims)?;

        Ok(Some(StorageEvent {
            kind: StorageEventKind::EntityActorsLimit,
            actor: None,
            context: None,
            entity: Some(subject.to_string()),
            deletions_count: n,
            timestamp: trigger.timestamp,
            created_at: trigger.created_at,
        }))
    }
}

fn has(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|x| x == needle)
}

/// An attestation that names itself as its own actor — the advisory
/// convention bulk ingesters use to sidestep the per-entity-actors cap.
fn is_self_certifying(a: &Attestation) -> bool {
    a.actors.iter().any(|actor| actor == &a.id)
}

fn snapshot(store: &dyn AttestationStore) -> StoreResult<Vec<Attestation>> {
    let ids = store.ids()?;
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(a) = store.get(&id)? {
            out.push(a);
        }
    }
    Ok(out)
}

/// Rank the distinct keys (contexts, or actors) produced by `key_fn` across
/// `attestations` by their newest timestamp ascending, and return however
/// many of the oldest are surplus to `limit`.
fn oldest_surplus_keys(
    attestations: &[Attestation],
    limit: usize,
    key_fn: impl Fn(&Attestation) -> Vec<String>,
) -> Vec<String> {
    use std::collections::HashMap;

    let mut newest_by_key: HashMap<String, i64> = HashMap::new();
    for a in attestations {
        for key in key_fn(a) {
            newest_by_key
                .entry(key)
                .and_modify(|ts| *ts = (*ts).max(a.timestamp))
                .or_insert(a.timestamp);
        }
    }

    if newest_by_key.len() <= limit {
        return Vec::new();
    }

    let mut ranked: Vec<(String, i64)> = newest_by_key.into_iter().collect();
    ranked.sort_by_key(|(_, ts)| *ts);

    let surplus = ranked.len() - limit;
    ranked.into_iter().take(surplus).map(|(k, _)| k).collect()
}

fn evict(
    store: &mut dyn AttestationStore,
    tree: &MerkleObserver,
    victims: &[Attestation],
) -> StoreResult<usize> {
    let mut n = 0;
    for victim in victims {
        if store.delete(&victim.id)? {
            let leaf = crate::content_hash::content_hash(victim);
            tree.with_tree(|t| {
                for key in victim.group_keys() {
                    t.remove(&key, &leaf);
                }
            });
            n += 1;
        }
    }
    Ok(n)
}
