//! Scoring surface for whole messages: probabilities, dispositions and the
//! headers a mail filter stamps on the message.

use crate::{
    classifier::ClassifierError,
    config::FilterConfig,
    domain::{Clue, Disposition, Evidence, Polarity},
    storage::WordStore,
    tokenizer::SharedTokenizer,
    training::SharedClassifier,
};

pub struct Filter<S> {
    classifier: SharedClassifier<S>,
    tokenizer: SharedTokenizer,
    config: FilterConfig,
}

impl<S: WordStore> Filter<S> {
    pub fn new(
        classifier: SharedClassifier<S>,
        tokenizer: SharedTokenizer,
        config: FilterConfig,
    ) -> Self {
        Self {
            classifier,
            tokenizer,
            config,
        }
    }

    pub fn classifier(&self) -> &SharedClassifier<S> {
        &self.classifier
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn classify(&self, raw: &str) -> Result<f64, ClassifierError> {
        self.classifier
            .lock()
            .spamprob(self.tokenizer.tokenize(raw))
    }

    pub fn classify_with_evidence(&self, raw: &str) -> Result<(f64, Evidence), ClassifierError> {
        self.classifier
            .lock()
            .spamprob_with_evidence(self.tokenizer.tokenize(raw))
    }

    pub fn disposition(&self, prob: f64) -> Disposition {
        Disposition::from_probability(prob, self.config.ham_cutoff, self.config.spam_cutoff)
    }

    /// Returns `raw` with the disposition header (and optionally the evidence
    /// header) prepended. Earlier copies of either header are dropped.
    pub fn filter(&self, raw: &str, with_evidence: bool) -> Result<String, ClassifierError> {
        let (prob, evidence) = self.classify_with_evidence(raw)?;
        let disposition = self.disposition(prob);
        tracing::debug!(
            target: "classifier",
            %disposition,
            prob,
            clues = evidence.clues.len(),
            "message filtered"
        );

        let newline = if raw.contains("\r\n") { "\r\n" } else { "\n" };
        let mut body = remove_header(raw, &self.config.header_name);
        if with_evidence {
            body = remove_header(&body, &self.config.evidence_header);
        }

        let mut out = format!(
            "{}: {}; {:.*}{newline}",
            self.config.header_name, disposition, self.config.score_digits, prob
        );
        if with_evidence {
            out.push_str(&format!(
                "{}: {}{newline}",
                self.config.evidence_header,
                format_evidence(&evidence, self.config.score_digits)
            ));
        }
        out.push_str(&body);
        Ok(out)
    }

    /// Learns without recomputing probabilities; call
    /// [`Self::update_probabilities`] when done.
    pub fn train(&self, raw: &str, polarity: Polarity) -> Result<(), ClassifierError> {
        self.classifier
            .lock()
            .learn(self.tokenizer.tokenize(raw), polarity, false)
    }

    pub fn untrain(&self, raw: &str, polarity: Polarity) -> Result<(), ClassifierError> {
        self.classifier
            .lock()
            .unlearn(self.tokenizer.tokenize(raw), polarity, false)
    }

    pub fn update_probabilities(&self) -> Result<usize, ClassifierError> {
        self.classifier.lock().update_probabilities()
    }

    pub fn save(&self) -> Result<(), ClassifierError> {
        self.classifier.lock().store()
    }
}

/// `'*H*': 0.00; '*S*': 1.00; 'token': 0.99; 'other': 0.01`
///
/// The `*H*`/`*S*` pseudo-clues carry the chi-squared indicators and only
/// appear when the scheme produced them.
pub fn format_evidence(evidence: &Evidence, digits: usize) -> String {
    let indicators = evidence.indicators.iter().flat_map(|indicators| {
        [
            format!("'*H*': {:.*}", digits, indicators.ham),
            format!("'*S*': {:.*}", digits, indicators.spam),
        ]
    });
    indicators
        .chain(evidence.clues.iter().map(|clue| format_clue(clue, digits)))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_clue(clue: &Clue, digits: usize) -> String {
    format!("'{}': {:.*}", quote(&clue.token), digits, clue.probability)
}

fn quote(token: &str) -> String {
    let mut quoted = String::with_capacity(token.len());
    for c in token.chars() {
        match c {
            '\'' => quoted.push_str("\\'"),
            '\\' => quoted.push_str("\\\\"),
            c if c.is_control() => quoted.extend(c.escape_default()),
            c => quoted.push(c),
        }
    }
    quoted
}

/// Drops every occurrence of header `name` (with its continuation lines) from
/// the header block. The body is left untouched.
fn remove_header(raw: &str, name: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_headers = true;
    let mut skipping = false;
    for line in raw.split_inclusive('\n') {
        if in_headers {
            let content = line.trim_end_matches(['\r', '\n']);
            if content.is_empty() {
                in_headers = false;
            } else if skipping && content.starts_with([' ', '\t']) {
                continue;
            } else {
                skipping = content
                    .split_once(':')
                    .is_some_and(|(field, _)| field.trim().eq_ignore_ascii_case(name));
                if skipping {
                    continue;
                }
            }
        }
        out.push_str(line);
    }
    out
}
