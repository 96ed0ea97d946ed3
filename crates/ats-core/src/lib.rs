//! Attestation synchronization core.
//!
//! Provides the content-addressed data model, deterministic content
//! hashing, a Merkle state digest, the bounded-storage enforcement policy,
//! and the attestation store abstraction used by the `ats-sync`
//! reconciliation engine.

pub mod attestation;
pub mod bounded;
pub mod content_hash;
pub mod merkle;
pub mod observer;
pub mod storage;

pub use attestation::{Attestation, AttestationBuilder};
pub use bounded::{EnforcementConfig, Enforcer, StorageEvent, StorageEventKind};
pub use content_hash::{content_hash, content_hash_hex, ContentHash};
pub use merkle::{GroupKey, MerkleDiff, MerkleTree};
pub use observer::{AttestationObserver, MerkleBacked, MerkleObserver};
pub use storage::{AttestationQuery, AttestationStore, MemoryStore, StoreError, StoreResult};
