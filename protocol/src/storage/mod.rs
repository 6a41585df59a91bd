//! # Storage Module
//!
//! Two ways of keeping ledger state around:
//!
//! ```text
//! db.rs      : sled persistence for plans, vaults and metadata
//! snapshot.rs: in-memory snapshot stack with revert-to-id semantics
//! ```
//!
//! The node writes through to [`LedgerDb`] after every committed engine
//! operation and rebuilds the engine from it at start. Tests use
//! [`SnapshotStack`] to run a scenario, roll back, and run the next one from
//! the same starting point.
//!
//! Bincode is the on-disk format: compact and deterministic. JSON is for the
//! API.

pub mod db;
pub mod snapshot;

pub use db::{DbError, DbResult, LedgerDb, Record};
pub use snapshot::{SnapshotError, SnapshotId, SnapshotStack};
