//! chainfeed-store — the receiver's durable, revisioned progress state.
//!
//! A memory-mapped file holds three logical tables: the progress singleton,
//! the recent received-blocks map, and the per-contract ABI map. Mutations
//! happen inside undo sessions keyed by revision (block number), so the
//! receiver can rewind on upstream forks and recover cleanly from a crash
//! between push and commit.

mod error;
mod store;
mod tables;

pub use error::StoreError;
pub use store::StateStore;
pub use tables::ProgressRecord;
