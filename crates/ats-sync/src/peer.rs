//! The four-phase symmetric reconciliation state machine run over a
//! [`Conn`]: hello, group_hashes, need, attestations, done.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ats_core::content_hash::{content_hash, hex_decode_32, hex_encode, ContentHash};
use ats_core::observer::MerkleBacked;
use ats_core::storage::{AttestationQuery, AttestationStore};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::conn::Conn;
use crate::error::{ProtocolError, ReconcileError};
use crate::wire::{AttestationWire, Envelope};

/// Drives one reconciliation session against a shared store. Cheap to
/// clone — the store is the only state, held behind a lock so a host can
/// run several sessions against the same store concurrently.
pub struct Peer<S> {
    store: Arc<RwLock<S>>,
    config: SyncConfig,
}

impl<S> Clone for Peer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S> Peer<S>
where
    S: AttestationStore + MerkleBacked + Send + Sync,
{
    pub fn new(store: Arc<RwLock<S>>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// Run one reconciliation session to completion. Returns `(sent,
    /// received)` attestation counts. Any violation of the wire protocol
    /// (an out-of-sequence tag) aborts the session with a
    /// `ReconcileError::Protocol`; a malformed individual attestation or a
    /// store error on a single record is logged and skipped, not fatal.
    pub async fn reconcile(&self, conn: &mut dyn Conn) -> Result<(u64, u64), ReconcileError> {
        tokio::time::timeout(self.config.timeout, self.reconcile_inner(conn))
            .await
            .map_err(|_| ReconcileError::Protocol(ProtocolError::Cancelled))?
    }

    async fn reconcile_inner(&self, conn: &mut dyn Conn) -> Result<(u64, u64), ReconcileError> {
        // Phase 1: hello. If roots already match, there is nothing to sync.
        let local_root = hex_encode(&self.read_root());
        conn.write_json(&Envelope::Hello {
            root_hash: local_root.clone(),
        })
        .await?;
        let remote_root = expect_hello(conn.read_json().await?)?;

        if local_root == remote_root {
            debug!(root = %local_root, "roots already match, nothing to reconcile");
            conn.write_json(&Envelope::Done {
                sent: 0,
                received: 0,
            })
            .await?;
            return Ok((0, 0));
        }

        // Phase 2: exchange group_hashes.
        let local_groups = self.read_group_hashes();
        conn.write_json(&Envelope::GroupHashes {
            groups: encode_group_map(&local_groups),
        })
        .await?;
        let remote_groups_wire = expect_group_hashes(conn.read_json().await?)?;
        let remote_groups = decode_group_map(&remote_groups_wire)?;

        // Phase 3: diff and request what's missing or divergent locally.
        let diff = self.read_diff(&remote_groups);
        let mut need: Vec<String> = diff
            .remote_only
            .iter()
            .chain(diff.divergent.iter())
            .map(hex_encode)
            .collect();
        need.sort();
        need.dedup();
        if need.len() > self.config.max_need_groups {
            warn!(
                requested = need.len(),
                cap = self.config.max_need_groups,
                "truncating need list to the configured cap"
            );
            need.truncate(self.config.max_need_groups);
        }
        conn.write_json(&Envelope::Need {
            groups: need.clone(),
        })
        .await?;
        let peer_need = expect_need(conn.read_json().await?)?;

        // Phase 4: send what the peer asked for, receive what we asked for.
        let (to_send, sent) = self.gather_for_need(&peer_need);
        conn.write_json(&Envelope::Attestations {
            attestations: to_send,
        })
        .await?;

        let received = if need.is_empty() {
            // Still consume the peer's reply to keep the two phases paired,
            // even though we expect nothing in it.
            let _ = expect_attestations(conn.read_json().await?)?;
            0
        } else {
            let groups = expect_attestations(conn.read_json().await?)?;
            self.ingest_all(groups)
        };

        conn.write_json(&Envelope::Done { sent, received }).await?;
        info!(sent, received, "reconciliation session complete");
        Ok((sent, received))
    }

    fn read_root(&self) -> ContentHash {
        self.store.read().tree().root()
    }

    fn read_group_hashes(&self) -> BTreeMap<ContentHash, ContentHash> {
        self.store.read().tree().group_hashes()
    }

    fn read_diff(
        &self,
        remote: &BTreeMap<ContentHash, ContentHash>,
    ) -> ats_core::merkle::MerkleDiff {
        self.store.read().tree().diff(remote)
    }

    /// For each group digest the peer asked for, resolve it to a local
    /// `(actor, context)` pair and gather its attestations. A digest this
    /// side doesn't recognize (can happen if the peer computed `need`
    /// against a slightly stale `group_hashes` snapshot) yields an empty
    /// list rather than an error.
    fn gather_for_need(
        &self,
        peer_need: &[String],
    ) -> (BTreeMap<String, Vec<AttestationWire>>, u64) {
        let store = self.store.read();
        let mut out = BTreeMap::new();
        let mut sent = 0u64;

        for group_hex in peer_need {
            let Some(digest) = hex_decode_32(group_hex) else {
                warn!(group = %group_hex, "skipping malformed group digest in need list");
                continue;
            };
            let Some(key) = store.tree().find_group_key(&digest) else {
                out.insert(group_hex.clone(), Vec::new());
                continue;
            };

            let query = AttestationQuery::new()
                .actor(key.actor.clone())
                .context(key.context.clone());
            let attestations = match store.query(&query) {
                Ok(a) => a,
                Err(e) => {
                    warn!(error = %e, actor = %key.actor, context = %key.context, "store error gathering group for sync");
                    Vec::new()
                }
            };

            let mut wire: Vec<AttestationWire> =
                attestations.iter().map(AttestationWire::from_attestation).collect();
            if wire.len() > self.config.max_attestations_per_message {
                warn!(
                    group = %group_hex,
                    available = wire.len(),
                    cap = self.config.max_attestations_per_message,
                    "truncating attestations for one group to the configured cap"
                );
                wire.truncate(self.config.max_attestations_per_message);
            }
            sent += wire.len() as u64;
            out.insert(group_hex.clone(), wire);
        }

        (out, sent)
    }

    /// Persist every attestation the peer sent. Duplicates — by id or by
    /// content hash under any of the attestation's group keys — are
    /// skipped silently; a malformed payload or store error is logged and
    /// skipped, never fatal to the session.
    fn ingest_all(&self, groups: BTreeMap<String, Vec<AttestationWire>>) -> u64 {
        let now = now_ns();
        let mut received = 0u64;
        for (group, wires) in groups {
            for wire in wires {
                match self.ingest_one(wire, now) {
                    Ok(true) => received += 1,
                    Ok(false) => {}
                    Err(e) => warn!(group = %group, error = %e, "skipping attestation"),
                }
            }
        }
        received
    }

    fn ingest_one(&self, wire: AttestationWire, now: i64) -> Result<bool, ProtocolError> {
        let attestation = wire.into_attestation(now)?;
        let leaf = content_hash(&attestation);

        let mut store = self.store.write();
        let already_present = store
            .tree()
            .with_tree(|tree| attestation.group_keys().iter().any(|k| tree.contains(k, &leaf)));
        if already_present {
            return Ok(false);
        }

        match store.create(attestation) {
            Ok(()) => Ok(true),
            Err(ats_core::StoreError::AlreadyExists(_)) => Ok(false),
            Err(e) => {
                warn!(error = %e, "store rejected attestation received during sync");
                Ok(false)
            }
        }
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as i64
}

fn encode_group_map(groups: &BTreeMap<ContentHash, ContentHash>) -> BTreeMap<String, String> {
    groups
        .iter()
        .map(|(k, v)| (hex_encode(k), hex_encode(v)))
        .collect()
}

fn decode_group_map(
    groups: &BTreeMap<String, String>,
) -> Result<BTreeMap<ContentHash, ContentHash>, ProtocolError> {
    let mut out = BTreeMap::new();
    for (k, v) in groups {
        let key = hex_decode_32(k)
            .ok_or_else(|| ProtocolError::Malformed(format!("bad group-key digest: {k}")))?;
        let val = hex_decode_32(v)
            .ok_or_else(|| ProtocolError::Malformed(format!("bad group digest: {v}")))?;
        out.insert(key, val);
    }
    Ok(out)
}

fn expect_hello(msg: Envelope) -> Result<String, ProtocolError> {
    match msg {
        Envelope::Hello { root_hash } => Ok(root_hash),
        other => Err(unexpected("hello", &other)),
    }
}

fn expect_group_hashes(msg: Envelope) -> Result<BTreeMap<String, String>, ProtocolError> {
    match msg {
        Envelope::GroupHashes { groups } => Ok(groups),
        other => Err(unexpected("group_hashes", &other)),
    }
}

fn expect_need(msg: Envelope) -> Result<Vec<String>, ProtocolError> {
    match msg {
        Envelope::Need { groups } => Ok(groups),
        other => Err(unexpected("need", &other)),
    }
}

fn expect_attestations(
    msg: Envelope,
) -> Result<BTreeMap<String, Vec<AttestationWire>>, ProtocolError> {
    match msg {
        Envelope::Attestations { attestations } => Ok(attestations),
        other => Err(unexpected("attestations", &other)),
    }
}

fn unexpected(expected: &'static str, got: &Envelope) -> ProtocolError {
    ProtocolError::UnexpectedTag {
        expected,
        got: got.tag().to_string(),
    }
}
