//! `aura-memory` – The Knowledge Base.
//!
//! Holds the running action → score table that every connection feeds and
//! reads, and the durable JSON artifact it is checkpointed to.
//!
//! # Modules
//!
//! - [`knowledge`] – [`KnowledgeStore`][knowledge::KnowledgeStore]: the
//!   concurrent score table implementing the weighted feedback rule together
//!   with its snapshot/restore contract.
//! - [`snapshot`] – [`SnapshotFile`][snapshot::SnapshotFile]: reads and
//!   atomically replaces the on-disk JSON snapshot.

pub mod knowledge;
pub mod snapshot;

pub use knowledge::{KnowledgeStore, Scores, WEIGHT_THRESHOLD};
pub use snapshot::SnapshotFile;
