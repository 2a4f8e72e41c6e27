//! Line-oriented export/import used to move training data between backends.
//!
//! ```text
//! nham,nspam,
//! token`hamcount`spamcount`
//! ```
//!
//! Tokens are percent-escaped so the separator and line breaks never appear
//! raw.

use std::io::{self, BufRead, BufWriter, Write};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

use super::WordStore;
use crate::classifier::{Classifier, ClassifierError};

pub const FIELD_SEPARATOR: char = '`';

const TOKEN_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'/');

#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("interchange I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("bad header line {0:?}, expected `nham,nspam,`")]
    BadHeader(String),
    #[error("malformed line {line}{}: {reason}", describe_token(.token))]
    MalformedLine {
        line: usize,
        token: Option<String>,
        reason: String,
    },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

fn describe_token(token: &Option<String>) -> String {
    token
        .as_ref()
        .map(|token| format!(" (token {token:?})"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    /// Drop every existing record and take the file's counters.
    #[default]
    Replace,
    /// Add the file's counters and word counts to what is already there.
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Report malformed lines and keep going.
    #[default]
    Lenient,
    /// Abort at the first malformed line.
    Strict,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    /// Only [`InterchangeError::MalformedLine`] values.
    pub rejected: Vec<InterchangeError>,
}

/// Writes every record of `classifier`, sorted by token. Returns the number
/// of token lines written.
pub fn export<S, W>(classifier: &mut Classifier<S>, writer: W) -> Result<usize, InterchangeError>
where
    S: WordStore,
    W: Write,
{
    let mut out = BufWriter::new(writer);
    let state = classifier.state();
    writeln!(out, "{},{},", state.nham, state.nspam)?;

    let mut tokens = classifier.tokens()?;
    tokens.sort();
    let mut written = 0;
    for token in tokens {
        let Some(record) = classifier.record(&token)? else {
            continue;
        };
        writeln!(
            out,
            "{quoted}{sep}{ham}{sep}{spam}{sep}",
            quoted = utf8_percent_encode(&token, TOKEN_ESCAPES),
            sep = FIELD_SEPARATOR,
            ham = record.ham_count,
            spam = record.spam_count,
        )?;
        written += 1;
    }
    out.flush()?;

    tracing::info!(
        target: "interchange",
        nham = state.nham,
        nspam = state.nspam,
        words = written,
        "exported training data"
    );
    Ok(written)
}

/// Reads an export into `classifier` and recomputes probabilities once.
///
/// In strict mode an error leaves whatever was applied before it in place;
/// do not store the classifier afterwards.
pub fn import<S, R>(
    classifier: &mut Classifier<S>,
    reader: R,
    mode: ImportMode,
    strictness: Strictness,
) -> Result<ImportReport, InterchangeError>
where
    S: WordStore,
    R: BufRead,
{
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(InterchangeError::BadHeader(String::new())),
    };
    let (nham, nspam) = parse_header(&header)?;

    if mode == ImportMode::Replace {
        classifier.reset()?;
    }
    classifier.add_trained(nham, nspam);

    let mut report = ImportReport::default();
    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(index + 2, &line) {
            Ok((token, ham, spam)) => {
                classifier.merge_counts(&token, ham, spam)?;
                report.imported += 1;
            }
            Err(err) if strictness == Strictness::Strict => return Err(err),
            Err(err) => {
                tracing::warn!(target: "interchange", error = %err, "skipping malformed line");
                report.rejected.push(err);
            }
        }
    }
    classifier.update_probabilities()?;

    tracing::info!(
        target: "interchange",
        ?mode,
        imported = report.imported,
        rejected = report.rejected.len(),
        nham = classifier.nham(),
        nspam = classifier.nspam(),
        "imported training data"
    );
    Ok(report)
}

fn parse_header(header: &str) -> Result<(u32, u32), InterchangeError> {
    let bad = || InterchangeError::BadHeader(header.to_string());
    let fields: Vec<&str> = header.trim_end().split(',').collect();
    match fields.as_slice() {
        [nham, nspam, rest] if rest.is_empty() => {
            let nham = nham.trim().parse().map_err(|_| bad())?;
            let nspam = nspam.trim().parse().map_err(|_| bad())?;
            Ok((nham, nspam))
        }
        _ => Err(bad()),
    }
}

fn parse_line(number: usize, line: &str) -> Result<(String, u32, u32), InterchangeError> {
    let malformed = |token: Option<&str>, reason: &str| InterchangeError::MalformedLine {
        line: number,
        token: token.map(str::to_string),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = line.trim_end_matches('\r').split(FIELD_SEPARATOR).collect();
    let [quoted, ham, spam, rest] = fields.as_slice() else {
        return Err(malformed(None, "expected three separated fields"));
    };
    if !rest.is_empty() {
        return Err(malformed(None, "trailing data after spam count"));
    }

    let token = percent_decode_str(quoted)
        .decode_utf8()
        .map_err(|_| malformed(None, "token is not valid UTF-8 once unescaped"))?
        .into_owned();
    if token.is_empty() {
        return Err(malformed(None, "empty token"));
    }
    let ham: u32 = ham
        .trim()
        .parse()
        .map_err(|_| malformed(Some(&token), "ham count is not a non-negative integer"))?;
    let spam: u32 = spam
        .trim()
        .parse()
        .map_err(|_| malformed(Some(&token), "spam count is not a non-negative integer"))?;
    if ham == 0 && spam == 0 {
        return Err(malformed(Some(&token), "record has no counts"));
    }
    Ok((token, ham, spam))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClassifierConfig,
        domain::Polarity,
        storage::{IncrementalStore, MemoryMedium},
    };

    type TestClassifier = Classifier<IncrementalStore<MemoryMedium>>;

    fn classifier() -> TestClassifier {
        Classifier::open(
            IncrementalStore::new(MemoryMedium::default()),
            ClassifierConfig::default(),
        )
        .unwrap()
    }

    fn exported(classifier: &mut TestClassifier) -> String {
        let mut buf = Vec::new();
        export(classifier, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn export_escapes_separator_and_sorts() {
        let mut classifier = classifier();
        classifier
            .learn(["zebra", "a`b c%", "subject:hi"], Polarity::Spam, false)
            .unwrap();
        classifier.learn(["zebra"], Polarity::Ham, false).unwrap();

        assert_eq!(
            exported(&mut classifier),
            "1,1,\na%60b%20c%25`0`1`\nsubject%3Ahi`0`1`\nzebra`1`1`\n"
        );
    }

    #[test]
    fn replace_import_reproduces_export() {
        let mut source = classifier();
        source.learn(["cheap", "pills", "a`b"], Polarity::Spam, false).unwrap();
        source.learn(["lunch", "cheap"], Polarity::Ham, false).unwrap();
        let text = exported(&mut source);

        let mut target = classifier();
        target.learn(["leftover"], Polarity::Ham, false).unwrap();
        let report = import(
            &mut target,
            text.as_bytes(),
            ImportMode::Replace,
            Strictness::Strict,
        )
        .unwrap();

        assert_eq!(report.imported, 4);
        assert!(report.rejected.is_empty());
        assert_eq!(target.state(), source.state());
        assert_eq!(target.record("leftover").unwrap(), None);
        assert_eq!(exported(&mut target), text);
        assert!(target.record("pills").unwrap().unwrap().spam_prob() > 0.5);
    }

    #[test]
    fn merge_import_adds_counts() {
        let mut target = classifier();
        target.learn(["cheap"], Polarity::Spam, false).unwrap();

        let text = "2,3,\ncheap`1`2`\nhello`2`0`\n";
        import(&mut target, text.as_bytes(), ImportMode::Merge, Strictness::Strict).unwrap();

        assert_eq!((target.nham(), target.nspam()), (2, 4));
        let cheap = target.record("cheap").unwrap().unwrap();
        assert_eq!((cheap.ham_count, cheap.spam_count), (1, 3));
        assert_eq!(target.record("hello").unwrap().unwrap().ham_count, 2);
    }

    #[test]
    fn lenient_import_reports_bad_lines() {
        let mut target = classifier();
        let text = "1,1,\ngood`1`0`\nbroken line\nnumb`x`1`\n\nempty`0`0`\nfine`0`1`\n";
        let report = import(
            &mut target,
            text.as_bytes(),
            ImportMode::Replace,
            Strictness::Lenient,
        )
        .unwrap();

        assert_eq!(report.imported, 2);
        let lines: Vec<usize> = report
            .rejected
            .iter()
            .map(|err| match err {
                InterchangeError::MalformedLine { line, .. } => *line,
                other => panic!("unexpected error {other}"),
            })
            .collect();
        assert_eq!(lines, vec![3, 4, 6]);
        assert!(matches!(
            &report.rejected[1],
            InterchangeError::MalformedLine { token: Some(token), .. } if token == "numb"
        ));
        assert_eq!(target.word_count().unwrap(), 2);
    }

    #[test]
    fn strict_import_stops_at_first_bad_line() {
        let mut target = classifier();
        let text = "1,1,\ngood`1`0`\nnumb`x`1`\nlater`0`1`\n";
        let err = import(
            &mut target,
            text.as_bytes(),
            ImportMode::Replace,
            Strictness::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, InterchangeError::MalformedLine { line: 3, .. }));
        assert!(err.to_string().contains("numb"));
    }

    #[test]
    fn bad_header_is_rejected() {
        let mut target = classifier();
        for text in ["", "ham,spam,\n", "1,2\n"] {
            let err = import(
                &mut target,
                text.as_bytes(),
                ImportMode::Replace,
                Strictness::Lenient,
            )
            .unwrap_err();
            assert!(matches!(err, InterchangeError::BadHeader(_)), "{text:?}");
        }
    }
}
