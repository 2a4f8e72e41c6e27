use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use bayes_spam::{config::StorageBackend, domain::Polarity};

#[derive(Debug, Parser)]
#[command(name = "bayes-spam", version, about = "Bayesian spam classifier", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Learn messages as spam or ham.
    Train(TrainArgs),
    /// Reverse an earlier training of the same messages.
    Untrain(TrainArgs),
    /// Print the spam probability of each message.
    Score {
        /// Also print the clues behind each score.
        #[arg(long)]
        evidence: bool,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print a message with classification headers added.
    Filter {
        path: PathBuf,
        /// Add the evidence header as well.
        #[arg(long)]
        evidence: bool,
    },
    /// Write the training data in the line-oriented interchange format.
    Export { file: PathBuf },
    /// Load training data written by `export`.
    Import {
        /// Add to the current data instead of replacing it.
        #[arg(long)]
        merge: bool,
        /// Abort at the first malformed line.
        #[arg(long)]
        strict: bool,
        file: PathBuf,
    },
    /// Copy the current store into a new store of another backend.
    Convert {
        #[arg(long)]
        to: StorageBackend,
        dest: PathBuf,
    },
    /// Drop words not consulted during the last N days.
    ClearStale {
        #[arg(long)]
        days: u32,
    },
    /// Print training counters and vocabulary size.
    Stats,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("polarity").required(true).args(["spam", "ham"])))]
pub struct TrainArgs {
    #[arg(long)]
    pub spam: bool,
    #[arg(long)]
    pub ham: bool,
    /// Message files, or directories of message files.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

impl TrainArgs {
    pub fn polarity(&self) -> Polarity {
        Polarity::from(self.spam)
    }
}
