use std::collections::{BTreeSet, HashMap};

use super::{StorageError, WordStore};
use crate::domain::{TrainingState, WordRecord};

/// Key-value medium underneath [`IncrementalStore`].
///
/// Writes may be buffered until `flush`; reads must observe them before that.
pub trait WordMedium {
    fn fetch(&mut self, token: &str) -> Result<Option<WordRecord>, StorageError>;

    fn put(&mut self, token: &str, record: &WordRecord) -> Result<(), StorageError>;

    fn remove(&mut self, token: &str) -> Result<(), StorageError>;

    fn keys(&mut self) -> Result<Vec<String>, StorageError>;

    fn read_state(&mut self) -> Result<Option<TrainingState>, StorageError>;

    fn write_state(&mut self, state: &TrainingState) -> Result<(), StorageError>;

    /// Makes every buffered write durable as one unit.
    fn flush(&mut self) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dirty {
    Changed,
    Deleted,
}

/// Per-key backend: records are fetched on demand and cached in an overlay;
/// `store()` writes back only what changed.
///
/// Records with a total count of at most one skip the overlay and go straight
/// to the medium. They make up most of the vocabulary and are rarely touched
/// again.
#[derive(Debug)]
pub struct IncrementalStore<M> {
    medium: M,
    overlay: HashMap<String, WordRecord>,
    dirty: HashMap<String, Dirty>,
}

impl<M: WordMedium> IncrementalStore<M> {
    pub fn new(medium: M) -> Self {
        Self {
            medium,
            overlay: HashMap::new(),
            dirty: HashMap::new(),
        }
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn into_medium(self) -> M {
        self.medium
    }

    /// Number of keys awaiting write-back.
    pub fn pending_changes(&self) -> usize {
        self.dirty.len()
    }
}

impl<M: WordMedium> WordStore for IncrementalStore<M> {
    fn load_state(&mut self) -> Result<TrainingState, StorageError> {
        Ok(self.medium.read_state()?.unwrap_or_default())
    }

    fn get(&mut self, token: &str) -> Result<Option<WordRecord>, StorageError> {
        if let Some(record) = self.overlay.get(token) {
            return Ok(Some(record.clone()));
        }
        if self.dirty.get(token) == Some(&Dirty::Deleted) {
            return Ok(None);
        }
        let fetched = self.medium.fetch(token)?;
        if let Some(record) = &fetched {
            self.overlay.insert(token.to_string(), record.clone());
        }
        Ok(fetched)
    }

    fn set(&mut self, token: &str, record: WordRecord) -> Result<(), StorageError> {
        if record.total() <= 1 {
            self.medium.put(token, &record)?;
            self.overlay.remove(token);
            self.dirty.remove(token);
        } else {
            self.overlay.insert(token.to_string(), record);
            self.dirty.insert(token.to_string(), Dirty::Changed);
        }
        Ok(())
    }

    fn delete(&mut self, token: &str) -> Result<(), StorageError> {
        self.overlay.remove(token);
        self.dirty.insert(token.to_string(), Dirty::Deleted);
        Ok(())
    }

    fn tokens(&mut self) -> Result<Vec<String>, StorageError> {
        let mut tokens: BTreeSet<String> = self.medium.keys()?.into_iter().collect();
        tokens.extend(self.overlay.keys().cloned());
        for (token, flag) in &self.dirty {
            if *flag == Dirty::Deleted {
                tokens.remove(token);
            }
        }
        Ok(tokens.into_iter().collect())
    }

    fn store(&mut self, state: &TrainingState) -> Result<(), StorageError> {
        let changed = self.dirty.len();
        for (token, flag) in &self.dirty {
            match flag {
                Dirty::Changed => {
                    if let Some(record) = self.overlay.get(token) {
                        self.medium.put(token, record)?;
                    }
                }
                // The word may have been deleted before it was ever written.
                Dirty::Deleted => self.medium.remove(token)?,
            }
        }
        self.dirty.clear();
        self.medium.write_state(state)?;
        self.medium.flush()?;
        tracing::info!(
            target: "storage",
            changed,
            cached = self.overlay.len(),
            nspam = state.nspam,
            nham = state.nham,
            "incremental store flushed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::storage::MemoryMedium;

    fn record(spam: u32, ham: u32) -> WordRecord {
        let mut record = WordRecord::new(Utc::now(), 0.5);
        record.spam_count = spam;
        record.ham_count = ham;
        record
    }

    #[test]
    fn singletons_bypass_the_overlay() {
        let mut store = IncrementalStore::new(MemoryMedium::default());
        store.set("rare", record(1, 0)).unwrap();
        assert_eq!(store.pending_changes(), 0);
        assert!(store.medium().contains("rare"));

        store.set("common", record(2, 1)).unwrap();
        assert_eq!(store.pending_changes(), 1);
        assert!(!store.medium().contains("common"));
    }

    #[test]
    fn store_writes_changes_and_deletions() {
        let mut store = IncrementalStore::new(MemoryMedium::default());
        store.set("kept", record(2, 2)).unwrap();
        store.set("dropped", record(3, 0)).unwrap();
        store.store(&TrainingState { nspam: 3, nham: 2 }).unwrap();

        store.delete("dropped").unwrap();
        assert_eq!(store.get("dropped").unwrap(), None);
        store.store(&TrainingState { nspam: 3, nham: 2 }).unwrap();

        let mut medium = store.into_medium();
        assert!(medium.fetch("kept").unwrap().is_some());
        assert!(medium.fetch("dropped").unwrap().is_none());
        assert_eq!(
            medium.read_state().unwrap(),
            Some(TrainingState { nspam: 3, nham: 2 })
        );
        assert_eq!(medium.flush_count(), 2);
    }

    #[test]
    fn deleted_keys_are_hidden_from_tokens() {
        let mut store = IncrementalStore::new(MemoryMedium::default());
        store.set("a", record(1, 0)).unwrap();
        store.set("b", record(1, 1)).unwrap();
        store.delete("a").unwrap();
        assert_eq!(store.tokens().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn shrinking_record_moves_back_to_medium() {
        let mut store = IncrementalStore::new(MemoryMedium::default());
        store.set("word", record(2, 0)).unwrap();
        store.set("word", record(1, 0)).unwrap();
        assert_eq!(store.pending_changes(), 0);
        assert_eq!(store.get("word").unwrap().unwrap().spam_count, 1);
    }
}
