//! Error taxonomy for the reconciliation session, matching spec's
//! transport/protocol/cancellation split one-to-one.

use thiserror::Error;

/// A single `Conn` operation failed.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("transport I/O error: {0}")]
    Io(String),

    #[error("unexpected message tag: expected {expected}, got {got}")]
    UnexpectedTag { expected: &'static str, got: String },

    #[error("malformed message payload: {0}")]
    Malformed(String),

    #[error("session cancelled")]
    Cancelled,
}

/// The outcome of a `Peer::reconcile` call.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] ats_core::StoreError),
}
