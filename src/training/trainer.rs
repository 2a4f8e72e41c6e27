use super::{CorpusMessage, CorpusObserver, SharedClassifier};
use crate::{classifier::ClassifierError, domain::Polarity, storage::WordStore};

/// Binds a shared classifier to one training polarity.
pub struct Trainer<S> {
    classifier: SharedClassifier<S>,
    polarity: Polarity,
    update_probabilities: bool,
}

impl<S: WordStore> Trainer<S> {
    pub fn new(classifier: SharedClassifier<S>, polarity: Polarity) -> Self {
        Self {
            classifier,
            polarity,
            update_probabilities: true,
        }
    }

    pub fn spam(classifier: SharedClassifier<S>) -> Self {
        Self::new(classifier, Polarity::Spam)
    }

    pub fn ham(classifier: SharedClassifier<S>) -> Self {
        Self::new(classifier, Polarity::Ham)
    }

    /// Whether single-message train/untrain recompute probabilities
    /// immediately. On by default.
    pub fn with_update_probabilities(mut self, update: bool) -> Self {
        self.update_probabilities = update;
        self
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn classifier(&self) -> &SharedClassifier<S> {
        &self.classifier
    }

    pub fn train(&self, message: &dyn CorpusMessage) -> Result<(), ClassifierError> {
        tracing::debug!(target: "training", key = message.key(), polarity = %self.polarity, "train");
        self.classifier
            .lock()
            .learn(message.tokens(), self.polarity, self.update_probabilities)
    }

    pub fn untrain(&self, message: &dyn CorpusMessage) -> Result<(), ClassifierError> {
        tracing::debug!(target: "training", key = message.key(), polarity = %self.polarity, "untrain");
        self.classifier
            .lock()
            .unlearn(message.tokens(), self.polarity, self.update_probabilities)
    }

    /// Trains every message, recomputing probabilities once at the end.
    /// Returns the number of messages trained.
    pub fn train_all<'a, I, M>(&self, messages: I) -> Result<usize, ClassifierError>
    where
        I: IntoIterator<Item = &'a M>,
        M: CorpusMessage + 'a,
    {
        let mut classifier = self.classifier.lock();
        let mut trained = 0;
        for message in messages {
            classifier.learn(message.tokens(), self.polarity, false)?;
            trained += 1;
        }
        classifier.update_probabilities()?;
        tracing::info!(target: "training", trained, polarity = %self.polarity, "corpus trained");
        Ok(trained)
    }

    /// Untrains every message, recomputing probabilities once at the end.
    pub fn untrain_all<'a, I, M>(&self, messages: I) -> Result<usize, ClassifierError>
    where
        I: IntoIterator<Item = &'a M>,
        M: CorpusMessage + 'a,
    {
        let mut classifier = self.classifier.lock();
        let mut untrained = 0;
        for message in messages {
            classifier.unlearn(message.tokens(), self.polarity, false)?;
            untrained += 1;
        }
        classifier.update_probabilities()?;
        tracing::info!(target: "training", untrained, polarity = %self.polarity, "corpus untrained");
        Ok(untrained)
    }
}

impl<S: WordStore> CorpusObserver for Trainer<S> {
    fn on_message_added(&self, message: &dyn CorpusMessage) -> Result<(), ClassifierError> {
        self.train(message)
    }

    fn on_message_removed(&self, message: &dyn CorpusMessage) -> Result<(), ClassifierError> {
        self.untrain(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::Classifier,
        config::ClassifierConfig,
        storage::{IncrementalStore, MemoryMedium},
        tokenizer::TokenStream,
        training::shared,
    };

    struct Words {
        key: &'static str,
        words: &'static [&'static str],
    }

    impl CorpusMessage for Words {
        fn key(&self) -> &str {
            self.key
        }

        fn tokens(&self) -> TokenStream<'_> {
            Box::new(self.words.iter().map(|word| word.to_string()))
        }
    }

    fn shared_classifier() -> SharedClassifier<IncrementalStore<MemoryMedium>> {
        shared(
            Classifier::open(
                IncrementalStore::new(MemoryMedium::default()),
                ClassifierConfig::default(),
            )
            .unwrap(),
        )
    }

    const PROMO: Words = Words {
        key: "promo",
        words: &["free", "prize", "click"],
    };
    const STANDUP: Words = Words {
        key: "standup",
        words: &["agenda", "notes"],
    };

    #[test]
    fn observer_events_train_and_untrain() {
        let classifier = shared_classifier();
        let spam = Trainer::spam(classifier.clone());
        assert_eq!(spam.polarity(), Polarity::Spam);

        spam.on_message_added(&PROMO).unwrap();
        assert_eq!(classifier.lock().nspam(), 1);
        assert!(classifier.lock().spamprob(["prize"]).unwrap() > 0.9);

        spam.on_message_removed(&PROMO).unwrap();
        assert_eq!(classifier.lock().nspam(), 0);
        assert_eq!(classifier.lock().word_count().unwrap(), 0);
    }

    #[test]
    fn expiry_leaves_training_alone() {
        let classifier = shared_classifier();
        let ham = Trainer::ham(classifier.clone());
        assert_eq!(ham.polarity(), Polarity::Ham);
        ham.on_message_added(&STANDUP).unwrap();
        ham.on_message_expired(&STANDUP).unwrap();
        assert_eq!(classifier.lock().nham(), 1);
    }

    #[test]
    fn bulk_training_updates_probabilities_once() {
        let classifier = shared_classifier();
        let spam = Trainer::spam(classifier.clone());
        let ham = Trainer::ham(classifier.clone());

        assert_eq!(spam.train_all([&PROMO]).unwrap(), 1);
        assert_eq!(ham.train_all([&STANDUP, &STANDUP]).unwrap(), 2);
        let mut guard = classifier.lock();
        assert_eq!(guard.state().nham, 2);
        assert!(guard.spamprob(["agenda"]).unwrap() < 0.1);
        drop(guard);

        assert_eq!(ham.untrain_all([&STANDUP]).unwrap(), 1);
        let agenda = classifier.lock().record("agenda").unwrap().unwrap();
        assert_eq!(agenda.ham_count, 1);
    }

    #[test]
    fn untraining_unknown_message_fails() {
        let spam = Trainer::spam(shared_classifier()).with_update_probabilities(false);
        let err = spam.untrain(&PROMO).unwrap_err();
        assert!(err.requires_retrain());
    }
}
