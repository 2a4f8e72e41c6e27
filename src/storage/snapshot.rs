use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{StorageError, WordStore, FORMAT_VERSION};
use crate::domain::{TrainingState, WordRecord};

/// Whole-file backend: everything is read on open and rewritten on store.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    words: HashMap<String, WordRecord>,
    persisted: TrainingState,
}

#[derive(Deserialize)]
struct VersionTag {
    version: u32,
}

#[derive(Deserialize)]
struct SnapshotFile {
    nspam: u32,
    nham: u32,
    words: HashMap<String, WordRecord>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    nspam: u32,
    nham: u32,
    words: BTreeMap<&'a str, &'a WordRecord>,
}

impl SnapshotStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!(target: "storage", path = %path.display(), "new snapshot");
                return Ok(Self {
                    path,
                    words: HashMap::new(),
                    persisted: TrainingState::default(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let tag: VersionTag = serde_json::from_slice(&bytes)?;
        if tag.version != FORMAT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: tag.version,
                expected: FORMAT_VERSION,
            });
        }
        let file: SnapshotFile = serde_json::from_slice(&bytes)?;
        if let Some((token, _)) = file.words.iter().find(|(_, record)| record.is_empty()) {
            return Err(StorageError::CorruptRecord {
                token: token.clone(),
                reason: "both counts are zero".to_string(),
            });
        }

        tracing::info!(
            target: "storage",
            path = %path.display(),
            nspam = file.nspam,
            nham = file.nham,
            words = file.words.len(),
            "loaded existing snapshot"
        );
        Ok(Self {
            path,
            words: file.words,
            persisted: TrainingState {
                nspam: file.nspam,
                nham: file.nham,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, state: &TrainingState) -> Result<(), StorageError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let snapshot = SnapshotRef {
            version: FORMAT_VERSION,
            nspam: state.nspam,
            nham: state.nham,
            words: self
                .words
                .iter()
                .map(|(token, record)| (token.as_str(), record))
                .collect(),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| StorageError::Io(err.error))?;
        Ok(())
    }
}

impl WordStore for SnapshotStore {
    fn load_state(&mut self) -> Result<TrainingState, StorageError> {
        Ok(self.persisted)
    }

    fn get(&mut self, token: &str) -> Result<Option<WordRecord>, StorageError> {
        Ok(self.words.get(token).cloned())
    }

    fn set(&mut self, token: &str, record: WordRecord) -> Result<(), StorageError> {
        self.words.insert(token.to_string(), record);
        Ok(())
    }

    fn delete(&mut self, token: &str) -> Result<(), StorageError> {
        self.words.remove(token);
        Ok(())
    }

    fn tokens(&mut self) -> Result<Vec<String>, StorageError> {
        Ok(self.words.keys().cloned().collect())
    }

    fn store(&mut self, state: &TrainingState) -> Result<(), StorageError> {
        self.write_atomically(state)?;
        self.persisted = *state;
        tracing::info!(
            target: "storage",
            path = %self.path.display(),
            words = self.words.len(),
            "snapshot persisted"
        );
        Ok(())
    }
}
