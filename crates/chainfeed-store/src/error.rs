//! Error types for the durable state store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store file is corrupt: {0}")]
    Corrupt(String),

    #[error("Store is full: snapshot needs {needed} bytes, capacity is {capacity}")]
    OutOfSpace { needed: usize, capacity: usize },

    #[error("Undo requested with an empty session stack")]
    UndoStackEmpty,

    #[error("Cannot move the revision backwards while {0} sessions are pending")]
    RevisionWithPendingSessions(usize),

    #[error("Journal capacity exceeded at {0} pending sessions")]
    JournalFull(usize),
}
