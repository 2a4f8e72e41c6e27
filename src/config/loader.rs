use std::{env, str::FromStr};

use super::env::{
    AppConfig, ClassifierConfig, CombiningScheme, ConfigError, DirectoryConfig, FilterConfig,
    LoggingConfig, StorageBackend, StorageConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = ClassifierConfig::default();
        let classifier = ClassifierConfig {
            unknown_word_prob: parse_or("UNKNOWN_WORD_PROB", defaults.unknown_word_prob)?,
            min_spamprob: parse_or("MIN_SPAMPROB", defaults.min_spamprob)?,
            max_spamprob: parse_or("MAX_SPAMPROB", defaults.max_spamprob)?,
            max_discriminators: parse_or("MAX_DISCRIMINATORS", defaults.max_discriminators)?,
            min_prob_strength: parse_or("MIN_PROB_STRENGTH", defaults.min_prob_strength)?,
            ham_bias: parse_or("HAM_BIAS", defaults.ham_bias)?,
            spam_bias: parse_or("SPAM_BIAS", defaults.spam_bias)?,
            combining: combining_scheme(defaults.combining)?,
        };
        classifier.validate()?;

        let storage = StorageConfig {
            backend: parse_or("STORAGE_BACKEND", StorageBackend::Sqlite)?,
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").ok().filter(|v| !v.is_empty()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            file_name: env::var("LOG_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "bayes-spam.log".to_string()),
            console: parse_or("LOG_CONSOLE", true)?,
        };

        let filter_defaults = FilterConfig::default();
        let filter = FilterConfig {
            ham_cutoff: parse_or("HAM_CUTOFF", filter_defaults.ham_cutoff)?,
            spam_cutoff: parse_or("SPAM_CUTOFF", filter_defaults.spam_cutoff)?,
            header_name: env::var("DISPOSITION_HEADER").unwrap_or(filter_defaults.header_name),
            evidence_header: env::var("EVIDENCE_HEADER")
                .unwrap_or(filter_defaults.evidence_header),
            score_digits: parse_or("SCORE_DIGITS", filter_defaults.score_digits)?,
        };
        filter.validate()?;

        Ok(Self {
            classifier,
            storage,
            directories,
            logging,
            filter,
        })
    }
}

/// `COMBINING_SCHEME` wins; otherwise `USE_ROBINSON_COMBINING=false` selects
/// the product scheme.
fn combining_scheme(default: CombiningScheme) -> Result<CombiningScheme, ConfigError> {
    let legacy = parse_or("USE_ROBINSON_COMBINING", true)?;
    let fallback = if legacy { default } else { CombiningScheme::Product };
    parse_or("COMBINING_SCHEME", fallback)
}

/// Unset or empty variables fall back to `default`; unparsable ones are errors.
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}
