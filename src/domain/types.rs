use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Training label of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Ham,
    Spam,
}

impl Polarity {
    pub fn is_spam(self) -> bool {
        matches!(self, Polarity::Spam)
    }
}

impl From<bool> for Polarity {
    fn from(is_spam: bool) -> Self {
        if is_spam {
            Polarity::Spam
        } else {
            Polarity::Ham
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Ham => f.write_str("ham"),
            Polarity::Spam => f.write_str("spam"),
        }
    }
}

/// Per-token statistics.
///
/// A record kept in a store always has `spam_count + ham_count > 0`; the
/// classifier deletes it as soon as both reach zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordRecord {
    pub spam_count: u32,
    pub ham_count: u32,
    /// How often this token was part of a scoring decision. Diagnostic only.
    pub kill_count: u32,
    /// Last time scoring looked this token up (creation time until then).
    pub last_access: DateTime<Utc>,
    pub(crate) spam_prob: f64,
}

impl WordRecord {
    pub(crate) fn new(now: DateTime<Utc>, spam_prob: f64) -> Self {
        Self {
            spam_count: 0,
            ham_count: 0,
            kill_count: 0,
            last_access: now,
            spam_prob,
        }
    }

    /// Cached probability, refreshed by `Classifier::update_probabilities`.
    pub fn spam_prob(&self) -> f64 {
        self.spam_prob
    }

    pub fn total(&self) -> u64 {
        u64::from(self.spam_count) + u64::from(self.ham_count)
    }

    pub fn is_empty(&self) -> bool {
        self.spam_count == 0 && self.ham_count == 0
    }

    pub fn count(&self, polarity: Polarity) -> u32 {
        match polarity {
            Polarity::Ham => self.ham_count,
            Polarity::Spam => self.spam_count,
        }
    }

    pub(crate) fn count_mut(&mut self, polarity: Polarity) -> &mut u32 {
        match polarity {
            Polarity::Ham => &mut self.ham_count,
            Polarity::Spam => &mut self.spam_count,
        }
    }
}

/// Number of messages trained per polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingState {
    pub nspam: u32,
    pub nham: u32,
}

impl TrainingState {
    pub fn count(&self, polarity: Polarity) -> u32 {
        match polarity {
            Polarity::Ham => self.nham,
            Polarity::Spam => self.nspam,
        }
    }

    pub(crate) fn count_mut(&mut self, polarity: Polarity) -> &mut u32 {
        match polarity {
            Polarity::Ham => &mut self.nham,
            Polarity::Spam => &mut self.nspam,
        }
    }
}

/// A token together with the probability it contributed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clue {
    pub token: String,
    pub probability: f64,
}

/// Tokens behind a score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    /// Clues folded into the final probability, ascending by probability.
    pub clues: Vec<Clue>,
    /// Floor/ceiling clues that cancelled each other out.
    pub cancelled: Vec<Clue>,
    /// Only the chi-squared scheme produces these.
    pub indicators: Option<Indicators>,
}

/// Separate spam and ham indicators behind a chi-squared score, each in
/// `[0, 1]`. Both high means the message carries strong evidence both ways.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Indicators {
    pub spam: f64,
    pub ham: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    Ham,
    Unsure,
    Spam,
}

impl Disposition {
    /// `prob < ham_cutoff` is ham, `prob > spam_cutoff` is spam.
    pub fn from_probability(prob: f64, ham_cutoff: f64, spam_cutoff: f64) -> Self {
        if prob < ham_cutoff {
            Disposition::Ham
        } else if prob > spam_cutoff {
            Disposition::Spam
        } else {
            Disposition::Unsure
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Ham => "ham",
            Disposition::Unsure => "unsure",
            Disposition::Spam => "spam",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
