//! Bayesian spam classification with pluggable persistence.
//!
//! Raw messages go through a [`tokenizer::Tokenizer`], the resulting token
//! stream is scored or learned by a [`classifier::Classifier`], and word
//! statistics live in a [`storage::WordStore`] until `store()` persists them.

pub mod classifier;
pub mod config;
pub mod domain;
pub mod filter;
pub mod infrastructure;
pub mod storage;
pub mod tokenizer;
pub mod training;
