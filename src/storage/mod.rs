//! Persistence backends for word records and training counters.
//!
//! The classifier owns the data; a [`WordStore`] is the delegate it reads
//! records through and hands the counters to on `store()`.

use std::io;

use thiserror::Error;

use crate::domain::{TrainingState, WordRecord};

pub mod convert;
pub mod incremental;
pub mod interchange;
pub mod memory;
pub mod snapshot;
pub mod sqlite;

pub use convert::convert;
pub use incremental::{IncrementalStore, WordMedium};
pub use interchange::{export, import, ImportMode, ImportReport, InterchangeError, Strictness};
pub use memory::MemoryMedium;
pub use snapshot::SnapshotStore;
pub use sqlite::SqliteMedium;

/// Version tag shared by the snapshot file and the SQLite state row.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unsupported storage format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("corrupt record for token {token:?}: {reason}")]
    CorruptRecord { token: String, reason: String },
}

/// Keyed access to word records plus load/store of the training counters.
///
/// Implementations must behave identically as seen through the classifier;
/// they differ only in how much I/O each call costs.
pub trait WordStore {
    /// Counters as last persisted; zero for a fresh store.
    fn load_state(&mut self) -> Result<TrainingState, StorageError>;

    fn get(&mut self, token: &str) -> Result<Option<WordRecord>, StorageError>;

    fn set(&mut self, token: &str, record: WordRecord) -> Result<(), StorageError>;

    /// Deleting an absent token is not an error.
    fn delete(&mut self, token: &str) -> Result<(), StorageError>;

    /// Every token currently holding a record.
    fn tokens(&mut self) -> Result<Vec<String>, StorageError>;

    /// Persists all records and `state`. Either completes or leaves the
    /// previously persisted data readable.
    fn store(&mut self, state: &TrainingState) -> Result<(), StorageError>;
}
