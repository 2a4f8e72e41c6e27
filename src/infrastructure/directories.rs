use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::config::{DirectoryConfig, StorageBackend};

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Snapshot file or SQLite database, depending on the backend.
    pub db_path: PathBuf,
}

pub fn ensure_directories(cfg: &DirectoryConfig, backend: StorageBackend) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;
    let filename = cfg
        .db_filename
        .as_deref()
        .unwrap_or_else(|| backend.default_filename());
    let db_path = data_dir.join(filename);

    let write_check = data_dir.join(".write-test");
    fs::write(&write_check, b"ok")
        .with_context(|| format!("data directory {} is not writable", data_dir.display()))?;
    fs::remove_file(&write_check)?;
    Ok(ResolvedPaths {
        logs_dir,
        data_dir,
        db_path,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {}", path))?;
    }
    Ok(canonical(&dir))
}

fn canonical(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directories_and_picks_backend_filename() {
        let root = tempfile::tempdir().unwrap();
        let cfg = DirectoryConfig {
            logs_dir: root.path().join("logs").display().to_string(),
            data_dir: root.path().join("nested/data").display().to_string(),
            db_filename: None,
        };

        let paths = ensure_directories(&cfg, StorageBackend::Snapshot).unwrap();
        assert!(paths.logs_dir.is_dir());
        assert!(paths.data_dir.is_dir());
        assert_eq!(paths.db_path.file_name().unwrap(), "bayes.json");
        assert!(!paths.data_dir.join(".write-test").exists());
    }

    #[test]
    fn explicit_filename_wins() {
        let root = tempfile::tempdir().unwrap();
        let cfg = DirectoryConfig {
            logs_dir: root.path().display().to_string(),
            data_dir: root.path().display().to_string(),
            db_filename: Some("custom.sqlite".into()),
        };
        let paths = ensure_directories(&cfg, StorageBackend::Sqlite).unwrap();
        assert_eq!(paths.db_path.file_name().unwrap(), "custom.sqlite");
    }
}
