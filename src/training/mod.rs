//! Turns corpus notifications into classifier training.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    classifier::{Classifier, ClassifierError},
    domain::MailMessage,
    tokenizer::TokenStream,
};

pub mod corpus;
mod trainer;

pub use corpus::collect_messages;
pub use trainer::Trainer;

/// The classifier behind the lock every trainer and filter shares.
pub type SharedClassifier<S> = Arc<Mutex<Classifier<S>>>;

pub fn shared<S>(classifier: Classifier<S>) -> SharedClassifier<S> {
    Arc::new(Mutex::new(classifier))
}

/// What a corpus hands to its observers.
pub trait CorpusMessage {
    fn key(&self) -> &str;

    /// Restartable token stream of the message.
    fn tokens(&self) -> TokenStream<'_>;
}

impl CorpusMessage for MailMessage {
    fn key(&self) -> &str {
        MailMessage::key(self)
    }

    fn tokens(&self) -> TokenStream<'_> {
        MailMessage::tokens(self)
    }
}

/// Receives membership changes from a corpus.
pub trait CorpusObserver {
    fn on_message_added(&self, message: &dyn CorpusMessage) -> Result<(), ClassifierError>;

    fn on_message_removed(&self, message: &dyn CorpusMessage) -> Result<(), ClassifierError>;

    /// Age-based expiry from a corpus. Not an untraining by default.
    fn on_message_expired(&self, _message: &dyn CorpusMessage) -> Result<(), ClassifierError> {
        Ok(())
    }
}
