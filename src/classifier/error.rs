use thiserror::Error;

use crate::{domain::Polarity, storage::StorageError};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Unlearning a message that was never learned. The training history no
    /// longer matches the store; retrain from a trusted corpus.
    #[error("{polarity} message count would go negative")]
    NegativeTrainingCount { polarity: Polarity },
    /// The store may already be partially updated when this is returned.
    #[error("{polarity} count for token {token:?} would go negative")]
    NegativeWordCount { token: String, polarity: Polarity },
}

impl ClassifierError {
    /// True for errors that mean the store disagrees with the training history.
    pub fn requires_retrain(&self) -> bool {
        matches!(
            self,
            ClassifierError::NegativeTrainingCount { .. } | ClassifierError::NegativeWordCount { .. }
        )
    }
}
