use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};

use bayes_spam::{
    classifier::Classifier,
    config::{AppConfig, StorageBackend},
    filter::{format_evidence, Filter},
    infrastructure::directories::ResolvedPaths,
    storage::{
        self, ImportMode, IncrementalStore, SnapshotStore, SqliteMedium, Strictness, WordStore,
    },
    tokenizer::{MailTokenizer, SharedTokenizer},
    training::{self, collect_messages, SharedClassifier, Trainer},
};

use crate::cli::{Command, TrainArgs};

pub struct BayesApp {
    config: AppConfig,
    paths: ResolvedPaths,
    tokenizer: SharedTokenizer,
}

impl BayesApp {
    pub fn initialize(config: AppConfig, paths: ResolvedPaths) -> Self {
        Self {
            config,
            paths,
            tokenizer: Arc::new(MailTokenizer::default()),
        }
    }

    pub fn run(self, command: Command) -> Result<()> {
        if let Command::Convert { to, dest } = &command {
            return self.convert(*to, dest);
        }

        let db_path = &self.paths.db_path;
        match self.config.storage.backend {
            StorageBackend::Snapshot => {
                let store = SnapshotStore::open(db_path)
                    .with_context(|| format!("failed to open snapshot {}", db_path.display()))?;
                self.execute(store, command)?;
            }
            StorageBackend::Sqlite => {
                let medium = SqliteMedium::open(db_path)
                    .with_context(|| format!("failed to open database {}", db_path.display()))?;
                let store = self.execute(IncrementalStore::new(medium), command)?;
                store.into_medium().close();
            }
        }
        Ok(())
    }

    /// Runs one command against `store` and hands the store back for cleanup.
    fn execute<S: WordStore>(&self, store: S, command: Command) -> Result<S> {
        let classifier = Classifier::open(store, self.config.classifier.clone())?;
        let shared = training::shared(classifier);

        match command {
            Command::Train(args) => self.train(&shared, &args, false)?,
            Command::Untrain(args) => self.train(&shared, &args, true)?,
            Command::Score { evidence, paths } => self.score(&shared, &paths, evidence)?,
            Command::Filter { path, evidence } => self.filter(&shared, &path, evidence)?,
            Command::Export { file } => {
                let out = File::create(&file)
                    .with_context(|| format!("failed to create {}", file.display()))?;
                let written = storage::export(&mut *shared.lock(), out)?;
                println!("exported {written} words to {}", file.display());
            }
            Command::Import {
                merge,
                strict,
                file,
            } => self.import(&shared, &file, merge, strict)?,
            Command::ClearStale { days } => {
                let cutoff = Utc::now() - Duration::days(i64::from(days));
                let mut classifier = shared.lock();
                let removed = classifier.clear_stale(cutoff)?;
                classifier.store()?;
                println!("removed {removed} words unused since {cutoff}");
            }
            Command::Stats => {
                let mut classifier = shared.lock();
                let words = classifier.word_count()?;
                println!("backend: {}", self.config.storage.backend);
                println!("path:    {}", self.paths.db_path.display());
                println!("ham:     {}", classifier.nham());
                println!("spam:    {}", classifier.nspam());
                println!("words:   {words}");
            }
            Command::Convert { .. } => bail!("convert runs without an open classifier"),
        }

        let classifier = Arc::try_unwrap(shared)
            .ok()
            .context("classifier is still shared after the command finished")?
            .into_inner();
        Ok(classifier.into_store())
    }

    fn train<S: WordStore>(
        &self,
        shared: &SharedClassifier<S>,
        args: &TrainArgs,
        reverse: bool,
    ) -> Result<()> {
        let messages = collect_messages(&args.paths, &self.tokenizer)?;
        let trainer = Trainer::new(shared.clone(), args.polarity());
        let count = if reverse {
            trainer.untrain_all(&messages)
        } else {
            trainer.train_all(&messages)
        }
        .inspect_err(|err| {
            if err.requires_retrain() {
                tracing::error!(target: "cli", error = %err, "training history is inconsistent; retrain from a trusted corpus");
            }
        })?;
        shared.lock().store()?;

        let verb = if reverse { "untrained" } else { "trained" };
        println!("{verb} {count} {} messages", args.polarity());
        Ok(())
    }

    fn score<S: WordStore>(
        &self,
        shared: &SharedClassifier<S>,
        paths: &[PathBuf],
        show_evidence: bool,
    ) -> Result<()> {
        let messages = collect_messages(paths, &self.tokenizer)?;
        let filter = Filter::new(shared.clone(), self.tokenizer.clone(), self.config.filter.clone());
        for message in &messages {
            let (prob, evidence) = filter.classify_with_evidence(message.raw())?;
            println!(
                "{}\t{:.*}\t{}",
                message.key(),
                self.config.filter.score_digits,
                prob,
                filter.disposition(prob)
            );
            if show_evidence {
                println!("\t{}", format_evidence(&evidence, self.config.filter.score_digits));
            }
        }
        // Scoring refreshes access times, which staleness eviction relies on.
        filter.save()?;
        Ok(())
    }

    fn filter<S: WordStore>(
        &self,
        shared: &SharedClassifier<S>,
        path: &Path,
        evidence: bool,
    ) -> Result<()> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let raw = String::from_utf8_lossy(&bytes);
        let filter = Filter::new(shared.clone(), self.tokenizer.clone(), self.config.filter.clone());
        print!("{}", filter.filter(&raw, evidence)?);
        filter.save()?;
        Ok(())
    }

    fn import<S: WordStore>(
        &self,
        shared: &SharedClassifier<S>,
        file: &Path,
        merge: bool,
        strict: bool,
    ) -> Result<()> {
        let reader = BufReader::new(
            File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
        );
        let mode = if merge {
            ImportMode::Merge
        } else {
            ImportMode::Replace
        };
        let strictness = if strict {
            Strictness::Strict
        } else {
            Strictness::Lenient
        };

        let mut classifier = shared.lock();
        let report = storage::import(&mut *classifier, reader, mode, strictness)?;
        for rejected in &report.rejected {
            eprintln!("skipped: {rejected}");
        }
        classifier.store()?;
        println!(
            "imported {} words ({} rejected); now {} ham, {} spam",
            report.imported,
            report.rejected.len(),
            classifier.nham(),
            classifier.nspam()
        );
        Ok(())
    }

    fn convert(&self, to: StorageBackend, dest: &Path) -> Result<()> {
        let source_path = &self.paths.db_path;
        if dest == source_path.as_path() {
            bail!("destination {} is the current store", dest.display());
        }

        let copied = match self.config.storage.backend {
            StorageBackend::Snapshot => {
                let mut source = SnapshotStore::open(source_path)?;
                convert_into(&mut source, to, dest)?
            }
            StorageBackend::Sqlite => {
                let mut source = IncrementalStore::new(SqliteMedium::open(source_path)?);
                let copied = convert_into(&mut source, to, dest)?;
                source.into_medium().close();
                copied
            }
        };
        println!(
            "copied {copied} words from {} ({}) to {} ({to})",
            source_path.display(),
            self.config.storage.backend,
            dest.display()
        );
        Ok(())
    }
}

fn convert_into<A: WordStore>(source: &mut A, to: StorageBackend, dest: &Path) -> Result<usize> {
    let copied = match to {
        StorageBackend::Snapshot => {
            let mut target = SnapshotStore::open(dest)?;
            storage::convert(source, &mut target)?
        }
        StorageBackend::Sqlite => {
            let mut target = IncrementalStore::new(SqliteMedium::open(dest)?);
            let copied = storage::convert(source, &mut target)?;
            target.into_medium().close();
            copied
        }
    };
    Ok(copied)
}
