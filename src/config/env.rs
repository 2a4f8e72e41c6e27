use std::{fmt, str::FromStr};

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub filter: FilterConfig,
}

/// Tunables of the scoring engine. Each classifier instance owns its copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Probability assumed for tokens the store has never seen.
    pub unknown_word_prob: f64,
    pub min_spamprob: f64,
    pub max_spamprob: f64,
    /// Size of the strongest-evidence set used for the final score.
    pub max_discriminators: usize,
    /// Tokens closer than this to 0.5 never take part in scoring.
    pub min_prob_strength: f64,
    pub ham_bias: f64,
    pub spam_bias: f64,
    pub combining: CombiningScheme,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            unknown_word_prob: 0.5,
            min_spamprob: 0.01,
            max_spamprob: 0.99,
            max_discriminators: 16,
            min_prob_strength: 0.0,
            ham_bias: 2.0,
            spam_bias: 1.0,
            combining: CombiningScheme::Robinson,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("UNKNOWN_WORD_PROB", self.unknown_word_prob),
            ("MIN_SPAMPROB", self.min_spamprob),
            ("MAX_SPAMPROB", self.max_spamprob),
            ("MIN_PROB_STRENGTH", self.min_prob_strength),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { key, value });
            }
        }
        if self.min_spamprob >= self.max_spamprob {
            return Err(ConfigError::Inconsistent(
                "MIN_SPAMPROB must be below MAX_SPAMPROB",
            ));
        }
        if self.max_discriminators == 0 {
            return Err(ConfigError::Inconsistent(
                "MAX_DISCRIMINATORS must be at least 1",
            ));
        }
        if self.ham_bias < 0.0 || self.spam_bias < 0.0 {
            return Err(ConfigError::Inconsistent("biases must not be negative"));
        }
        Ok(())
    }
}

/// How the selected clue probabilities become one message probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombiningScheme {
    /// Robinson's geometric means.
    #[default]
    Robinson,
    /// Fisher's chi-squared test on the spam and ham sides separately. Less
    /// prone to one strong side drowning out the other.
    ChiSquared,
    /// Graham's raw product. Kept for comparison runs only.
    Product,
}

impl FromStr for CombiningScheme {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "robinson" => Ok(CombiningScheme::Robinson),
            "chi-squared" | "chi2" | "fisher" => Ok(CombiningScheme::ChiSquared),
            "product" | "graham" => Ok(CombiningScheme::Product),
            _ => Err(ConfigError::Invalid {
                key: "COMBINING_SCHEME",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for CombiningScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombiningScheme::Robinson => f.write_str("robinson"),
            CombiningScheme::ChiSquared => f.write_str("chi-squared"),
            CombiningScheme::Product => f.write_str("product"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Whole-file JSON snapshot, loaded and saved in one piece.
    Snapshot,
    /// SQLite database read and written per key.
    Sqlite,
}

impl StorageBackend {
    pub fn default_filename(self) -> &'static str {
        match self {
            StorageBackend::Snapshot => "bayes.json",
            StorageBackend::Sqlite => "bayes.db",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "snapshot" | "json" | "pickle" => Ok(StorageBackend::Snapshot),
            "sqlite" | "incremental" | "dbm" => Ok(StorageBackend::Sqlite),
            _ => Err(ConfigError::Invalid {
                key: "STORAGE_BACKEND",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Snapshot => f.write_str("snapshot"),
            StorageBackend::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    /// Overrides the backend's default database file name.
    pub db_filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directives; `RUST_LOG` overrides them.
    pub level: String,
    /// Base name of the daily-rotated file in the logs directory.
    pub file_name: String,
    /// Mirror log lines to stderr.
    pub console: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub ham_cutoff: f64,
    pub spam_cutoff: f64,
    pub header_name: String,
    pub evidence_header: String,
    pub score_digits: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ham_cutoff: 0.20,
            spam_cutoff: 0.90,
            header_name: "X-Spambayes-Classification".to_string(),
            evidence_header: "X-Spambayes-Evidence".to_string(),
            score_digits: 2,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ham_cutoff > self.spam_cutoff {
            return Err(ConfigError::Inconsistent(
                "HAM_CUTOFF must not exceed SPAM_CUTOFF",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must lie within [0, 1], got {value}")]
    OutOfRange { key: &'static str, value: f64 },
    #[error("inconsistent configuration: {0}")]
    Inconsistent(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ClassifierConfig::default().validate().unwrap();
        FilterConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = ClassifierConfig {
            min_spamprob: 0.9,
            max_spamprob: 0.1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Inconsistent(_))));
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("SQLite".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
        assert_eq!("snapshot".parse::<StorageBackend>().unwrap(), StorageBackend::Snapshot);
        assert!("zodb".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn combining_names_parse() {
        assert_eq!(
            "chi_squared".parse::<CombiningScheme>().unwrap(),
            CombiningScheme::ChiSquared
        );
        assert_eq!("Robinson".parse::<CombiningScheme>().unwrap(), CombiningScheme::Robinson);
        assert_eq!(
            CombiningScheme::ChiSquared.to_string().parse::<CombiningScheme>().unwrap(),
            CombiningScheme::ChiSquared
        );
        assert!("bayes".parse::<CombiningScheme>().is_err());
    }
}
