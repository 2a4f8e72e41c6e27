pub mod message;
pub mod types;

pub use message::MailMessage;
pub use types::{Clue, Disposition, Evidence, Indicators, Polarity, TrainingState, WordRecord};
