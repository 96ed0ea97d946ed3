//! Wire protocol and symmetric peer reconciliation over a duplex [`Conn`].
//!
//! A session runs four phases — `hello`, `group_hashes`, `need`,
//! `attestations` — ending in `done`, driven by [`Peer::reconcile`].

pub mod config;
pub mod conn;
pub mod error;
pub mod peer;
pub mod wire;

pub use config::SyncConfig;
pub use conn::{duplex_pair, ChannelConn, Conn};
pub use error::{ProtocolError, ReconcileError};
pub use peer::Peer;
pub use wire::{from_wire_millis, to_wire_millis, AttestationWire, Envelope};
