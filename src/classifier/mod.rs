pub mod combine;
mod engine;
mod error;
mod nbest;

pub use engine::{Classifier, Clock};
pub use error::ClassifierError;
pub use crate::config::ClassifierConfig;
