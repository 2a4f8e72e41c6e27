use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};

use super::{
    combine,
    error::ClassifierError,
    nbest::{Candidate, NBest},
};
use crate::{
    config::{ClassifierConfig, CombiningScheme},
    domain::{Clue, Evidence, Polarity, TrainingState, WordRecord},
    storage::WordStore,
    tokenizer::distinct_tokens,
};

/// Source of "now" for access times.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Bayesian-style spam classifier over a [`WordStore`].
///
/// Not safe for concurrent mutation; share it behind a lock.
pub struct Classifier<S> {
    words: S,
    state: TrainingState,
    config: ClassifierConfig,
    clock: Clock,
}

impl<S: WordStore> Classifier<S> {
    /// Opens a classifier over `words`, reading the persisted counters.
    pub fn open(mut words: S, config: ClassifierConfig) -> Result<Self, ClassifierError> {
        let state = words.load_state()?;
        tracing::info!(
            target: "classifier",
            nspam = state.nspam,
            nham = state.nham,
            combining = %config.combining,
            "classifier opened"
        );
        Ok(Self {
            words,
            state,
            config,
            clock: Arc::new(Utc::now),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn nspam(&self) -> u32 {
        self.state.nspam
    }

    pub fn nham(&self) -> u32 {
        self.state.nham
    }

    pub fn record(&mut self, token: &str) -> Result<Option<WordRecord>, ClassifierError> {
        Ok(self.words.get(token)?)
    }

    pub fn tokens(&mut self) -> Result<Vec<String>, ClassifierError> {
        Ok(self.words.tokens()?)
    }

    pub fn word_count(&mut self) -> Result<usize, ClassifierError> {
        Ok(self.words.tokens()?.len())
    }

    pub fn into_store(self) -> S {
        self.words
    }

    /// Probability that the token stream is spam.
    pub fn spamprob<I, T>(&mut self, tokens: I) -> Result<f64, ClassifierError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let (prob, _) = self.score(tokens, false)?;
        Ok(prob)
    }

    /// Like [`Self::spamprob`], also returning the clues behind the score.
    pub fn spamprob_with_evidence<I, T>(
        &mut self,
        tokens: I,
    ) -> Result<(f64, Evidence), ClassifierError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let (prob, evidence) = self.score(tokens, true)?;
        Ok((prob, evidence.unwrap_or_default()))
    }

    fn score<I, T>(
        &mut self,
        tokens: I,
        want_evidence: bool,
    ) -> Result<(f64, Option<Evidence>), ClassifierError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let now = (self.clock)();
        let cfg = &self.config;
        let mut touched: HashMap<String, WordRecord> = HashMap::new();
        let mut nbest = NBest::new(cfg.max_discriminators);
        let mut floors = Vec::new();
        let mut ceilings = Vec::new();

        let distinct = distinct_tokens(tokens);
        let examined = distinct.len();
        for (seq, token) in distinct.into_iter().enumerate() {
            let prob = match self.words.get(&token)? {
                Some(mut record) => {
                    record.last_access = now;
                    let prob = record.spam_prob;
                    touched.insert(token.clone(), record);
                    prob
                }
                None => cfg.unknown_word_prob,
            };
            let candidate = Candidate { seq, token, prob };
            if prob == cfg.min_spamprob {
                floors.push(candidate);
            } else if prob == cfg.max_spamprob {
                ceilings.push(candidate);
            } else if candidate.distance() >= cfg.min_prob_strength {
                nbest.offer(candidate);
            }
        }

        // A floor clue and a ceiling clue cancel exactly; only the surplus of
        // the larger side is scored, earliest encountered first and at most
        // `max_discriminators` of them. Everything else counts as cancelled.
        let (larger, smaller) = if ceilings.len() >= floors.len() {
            (ceilings, floors)
        } else {
            (floors, ceilings)
        };
        let tokeep = (larger.len() - smaller.len()).min(cfg.max_discriminators);
        let mut larger = larger.into_iter();
        for candidate in larger.by_ref().take(tokeep) {
            nbest.offer(candidate);
        }
        let mut cancelled: Vec<Candidate> = smaller.into_iter().chain(larger).collect();
        cancelled.sort_by_key(|candidate| candidate.seq);

        let used = nbest.into_candidates();
        for candidate in used.iter().chain(cancelled.iter()) {
            if let Some(record) = touched.get_mut(&candidate.token) {
                record.kill_count += 1;
            }
        }
        for (token, record) in touched {
            self.words.set(&token, record)?;
        }

        let probs: Vec<f64> = used.iter().map(|candidate| candidate.prob).collect();
        let (prob, indicators) = match self.config.combining {
            CombiningScheme::Robinson => (combine::robinson(&probs), None),
            CombiningScheme::ChiSquared => {
                let (prob, indicators) = combine::chi_squared(&probs);
                (prob, Some(indicators))
            }
            CombiningScheme::Product => (combine::product(&probs), None),
        };

        tracing::debug!(
            target: "classifier",
            examined,
            used = used.len(),
            cancelled = cancelled.len(),
            prob,
            "scored token stream"
        );

        let evidence = want_evidence.then(|| {
            let mut clues: Vec<Clue> = used.into_iter().map(to_clue).collect();
            clues.sort_by(|a, b| a.probability.total_cmp(&b.probability));
            Evidence {
                clues,
                cancelled: cancelled.into_iter().map(to_clue).collect(),
                indicators,
            }
        });
        Ok((prob, evidence))
    }

    /// Counts each distinct token of the message once for `polarity`.
    ///
    /// With `update_probabilities == false` cached probabilities go stale
    /// until [`Self::update_probabilities`] runs.
    pub fn learn<I, T>(
        &mut self,
        tokens: I,
        polarity: Polarity,
        update_probabilities: bool,
    ) -> Result<(), ClassifierError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let now = (self.clock)();
        *self.state.count_mut(polarity) += 1;

        for token in distinct_tokens(tokens) {
            let mut record = match self.words.get(&token)? {
                Some(record) => record,
                None => WordRecord::new(now, self.config.unknown_word_prob),
            };
            *record.count_mut(polarity) += 1;
            self.words.set(&token, record)?;
        }

        if update_probabilities {
            self.update_probabilities()?;
        }
        Ok(())
    }

    /// Reverses a previous [`Self::learn`] with the same tokens and polarity.
    ///
    /// Fails if the message was never learned under `polarity`; the store may
    /// then be partially updated and needs a full retrain.
    pub fn unlearn<I, T>(
        &mut self,
        tokens: I,
        polarity: Polarity,
        update_probabilities: bool,
    ) -> Result<(), ClassifierError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let trained = self.state.count_mut(polarity);
        if *trained == 0 {
            return Err(ClassifierError::NegativeTrainingCount { polarity });
        }
        *trained -= 1;

        for token in distinct_tokens(tokens) {
            let Some(mut record) = self.words.get(&token)? else {
                continue;
            };
            let count = record.count_mut(polarity);
            if *count == 0 {
                tracing::error!(
                    target: "classifier",
                    token = %token,
                    %polarity,
                    "unlearn below zero; training history is inconsistent"
                );
                return Err(ClassifierError::NegativeWordCount { token, polarity });
            }
            *count -= 1;
            if record.is_empty() {
                self.words.delete(&token)?;
            } else {
                self.words.set(&token, record)?;
            }
        }

        if update_probabilities {
            self.update_probabilities()?;
        }
        Ok(())
    }

    /// Recomputes every cached word probability. Returns how many changed.
    pub fn update_probabilities(&mut self) -> Result<usize, ClassifierError> {
        let nham = f64::from(self.state.nham.max(1));
        let nspam = f64::from(self.state.nspam.max(1));
        let mut changed = 0;
        let mut total = 0;

        for token in self.words.tokens()? {
            let Some(mut record) = self.words.get(&token)? else {
                continue;
            };
            total += 1;
            let prob = self.word_probability(&record, nham, nspam);
            if record.spam_prob != prob {
                record.spam_prob = prob;
                self.words.set(&token, record)?;
                changed += 1;
            }
        }
        tracing::debug!(target: "classifier", total, changed, "probabilities updated");
        Ok(changed)
    }

    fn word_probability(&self, record: &WordRecord, nham: f64, nspam: f64) -> f64 {
        let cfg = &self.config;
        let ham = (cfg.ham_bias * f64::from(record.ham_count)).min(nham);
        let spam = (cfg.spam_bias * f64::from(record.spam_count)).min(nspam);
        let ham_ratio = ham / nham;
        let spam_ratio = spam / nspam;
        let prob = if ham_ratio + spam_ratio == 0.0 {
            0.5
        } else {
            spam_ratio / (ham_ratio + spam_ratio)
        };
        prob.clamp(cfg.min_spamprob, cfg.max_spamprob)
    }

    /// Drops every record last consulted before `cutoff`. Training counters
    /// are left alone. Returns the number of records removed.
    pub fn clear_stale(&mut self, cutoff: DateTime<Utc>) -> Result<usize, ClassifierError> {
        let mut removed = 0;
        for token in self.words.tokens()? {
            if let Some(record) = self.words.get(&token)? {
                if record.last_access < cutoff {
                    self.words.delete(&token)?;
                    removed += 1;
                }
            }
        }
        tracing::info!(target: "classifier", removed, %cutoff, "stale words cleared");
        Ok(removed)
    }

    /// Persists records and counters through the backend.
    pub fn store(&mut self) -> Result<(), ClassifierError> {
        self.words.store(&self.state)?;
        Ok(())
    }

    /// Removes every record and zeroes the counters.
    pub(crate) fn reset(&mut self) -> Result<(), ClassifierError> {
        for token in self.words.tokens()? {
            self.words.delete(&token)?;
        }
        self.state = TrainingState::default();
        Ok(())
    }

    pub(crate) fn add_trained(&mut self, nham: u32, nspam: u32) {
        self.state.nham = self.state.nham.saturating_add(nham);
        self.state.nspam = self.state.nspam.saturating_add(nspam);
    }

    /// Adds raw counts to a token's record, creating it if needed.
    pub(crate) fn merge_counts(
        &mut self,
        token: &str,
        ham: u32,
        spam: u32,
    ) -> Result<(), ClassifierError> {
        let now = (self.clock)();
        let mut record = match self.words.get(token)? {
            Some(record) => record,
            None => WordRecord::new(now, self.config.unknown_word_prob),
        };
        record.ham_count = record.ham_count.saturating_add(ham);
        record.spam_count = record.spam_count.saturating_add(spam);
        self.words.set(token, record)?;
        Ok(())
    }
}

fn to_clue(candidate: Candidate) -> Clue {
    Clue {
        token: candidate.token,
        probability: candidate.prob,
    }
}
