use std::{fmt, fs, io, path::Path};

use crate::tokenizer::{SharedTokenizer, TokenStream};

/// A raw mail message plus the tokenizer that turns it into tokens.
#[derive(Clone)]
pub struct MailMessage {
    key: String,
    raw: String,
    tokenizer: SharedTokenizer,
}

impl MailMessage {
    pub fn new(key: impl Into<String>, raw: impl Into<String>, tokenizer: SharedTokenizer) -> Self {
        Self {
            key: key.into(),
            raw: raw.into(),
            tokenizer,
        }
    }

    /// Reads a message file; undecodable bytes are replaced rather than rejected.
    pub fn load(path: &Path, tokenizer: SharedTokenizer) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let raw = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Self::new(path.display().to_string(), raw, tokenizer))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Restartable: every call tokenizes the message from scratch.
    pub fn tokens(&self) -> TokenStream<'_> {
        self.tokenizer.tokenize(&self.raw)
    }
}

impl fmt::Debug for MailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailMessage")
            .field("key", &self.key)
            .field("len", &self.raw.len())
            .finish()
    }
}
