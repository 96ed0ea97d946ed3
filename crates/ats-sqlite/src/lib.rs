//! SQLite-backed implementation of `ats_core::storage::AttestationStore`.
//!
//! ```no_run
//! use ats_sqlite::SqliteStore;
//!
//! let mut store = SqliteStore::in_memory().unwrap();
//! ```

pub mod error;
pub mod json;
pub mod migrate;
pub mod store;

pub use error::{Result, SqliteError};
pub use store::SqliteStore;
