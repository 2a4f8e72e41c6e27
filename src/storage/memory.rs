use std::collections::HashMap;

use super::{incremental::WordMedium, StorageError};
use crate::domain::{TrainingState, WordRecord};

/// In-process medium for throwaway classifiers and tests. Nothing survives
/// the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryMedium {
    words: HashMap<String, WordRecord>,
    state: Option<TrainingState>,
    flushes: usize,
}

impl MemoryMedium {
    pub fn contains(&self, token: &str) -> bool {
        self.words.contains_key(token)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl WordMedium for MemoryMedium {
    fn fetch(&mut self, token: &str) -> Result<Option<WordRecord>, StorageError> {
        Ok(self.words.get(token).cloned())
    }

    fn put(&mut self, token: &str, record: &WordRecord) -> Result<(), StorageError> {
        self.words.insert(token.to_string(), record.clone());
        Ok(())
    }

    fn remove(&mut self, token: &str) -> Result<(), StorageError> {
        self.words.remove(token);
        Ok(())
    }

    fn keys(&mut self) -> Result<Vec<String>, StorageError> {
        Ok(self.words.keys().cloned().collect())
    }

    fn read_state(&mut self) -> Result<Option<TrainingState>, StorageError> {
        Ok(self.state)
    }

    fn write_state(&mut self, state: &TrainingState) -> Result<(), StorageError> {
        self.state = Some(*state);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.flushes += 1;
        Ok(())
    }
}
