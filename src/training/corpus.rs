use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{domain::MailMessage, tokenizer::SharedTokenizer};

/// Loads messages from files and directories. A directory contributes each
/// regular file directly inside it, in name order; subdirectories are skipped.
pub fn collect_messages<P: AsRef<Path>>(
    paths: &[P],
    tokenizer: &SharedTokenizer,
) -> io::Result<Vec<MailMessage>> {
    let mut files = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            files.extend(list_dir(path)?);
        } else {
            files.push(path.to_path_buf());
        }
    }

    let mut messages = Vec::with_capacity(files.len());
    for file in files {
        messages.push(MailMessage::load(&file, tokenizer.clone())?);
    }
    tracing::debug!(target: "training", count = messages.len(), "collected messages");
    Ok(messages)
}

fn list_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
