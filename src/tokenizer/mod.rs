//! Token-stream contract between raw messages and the classifier.
//!
//! A tokenizer must be deterministic for a given message and configuration
//! and must not mutate the message. The stream may be consumed once; callers
//! that need the tokens again tokenize again.

use std::{collections::HashSet, sync::Arc};

mod mail;

pub use mail::MailTokenizer;

pub type TokenStream<'a> = Box<dyn Iterator<Item = String> + 'a>;

pub type SharedTokenizer = Arc<dyn Tokenizer>;

pub trait Tokenizer: Send + Sync {
    fn tokenize<'a>(&'a self, raw: &'a str) -> TokenStream<'a>;
}

/// Collects the distinct tokens of a stream, keeping first-encounter order.
pub fn distinct_tokens<I, T>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    for token in tokens {
        let token = token.into();
        if seen.contains(&token) {
            continue;
        }
        seen.insert(token.clone());
        ordered.push(token);
    }
    ordered
}
