//! Properties that must hold on both persistent backends for any training
//! history.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use bayes_spam::{
    classifier::{Classifier, Clock},
    config::ClassifierConfig,
    domain::{Polarity, TrainingState, WordRecord},
    storage::{IncrementalStore, SnapshotStore, SqliteMedium, WordStore},
};

type Messages = Vec<(Vec<String>, bool)>;

/// Whole seconds so every backend stores access times without rounding.
fn fixed_clock() -> Clock {
    let now: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    Arc::new(move || now)
}

fn open_snapshot(path: &Path) -> Classifier<SnapshotStore> {
    Classifier::open(SnapshotStore::open(path).unwrap(), ClassifierConfig::default())
        .unwrap()
        .with_clock(fixed_clock())
}

fn open_sqlite(path: &Path) -> Classifier<IncrementalStore<SqliteMedium>> {
    let medium = SqliteMedium::open(path).unwrap();
    Classifier::open(IncrementalStore::new(medium), ClassifierConfig::default())
        .unwrap()
        .with_clock(fixed_clock())
}

fn polarity(is_spam: bool) -> Polarity {
    if is_spam {
        Polarity::Spam
    } else {
        Polarity::Ham
    }
}

fn messages() -> impl Strategy<Value = Messages> {
    prop::collection::vec(
        (prop::collection::vec("[a-z]{1,3}", 0..10), any::<bool>()),
        0..10,
    )
}

fn learn_all<S: WordStore>(classifier: &mut Classifier<S>, messages: &Messages) {
    for (tokens, is_spam) in messages {
        classifier.learn(tokens, polarity(*is_spam), false).unwrap();
    }
    classifier.update_probabilities().unwrap();
}

fn unlearn_all<S: WordStore>(classifier: &mut Classifier<S>, messages: &Messages) {
    for (tokens, is_spam) in messages {
        classifier.unlearn(tokens, polarity(*is_spam), false).unwrap();
    }
    classifier.update_probabilities().unwrap();
}

fn contents<S: WordStore>(
    classifier: &mut Classifier<S>,
) -> (TrainingState, BTreeMap<String, WordRecord>) {
    let records = classifier
        .tokens()
        .unwrap()
        .into_iter()
        .map(|token| {
            let record = classifier.record(&token).unwrap().unwrap();
            (token, record)
        })
        .collect();
    (classifier.state(), records)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn snapshot_reopens_to_the_stored_state(trained in messages()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayes.json");

        let mut classifier = open_snapshot(&path);
        learn_all(&mut classifier, &trained);
        let expected = contents(&mut classifier);
        classifier.store().unwrap();
        drop(classifier);

        let mut reopened = open_snapshot(&path);
        prop_assert_eq!(contents(&mut reopened), expected);
    }

    #[test]
    fn sqlite_reopens_to_the_stored_state(trained in messages()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayes.db");

        let mut classifier = open_sqlite(&path);
        learn_all(&mut classifier, &trained);
        let expected = contents(&mut classifier);
        classifier.store().unwrap();
        classifier.into_store().into_medium().close();

        let mut reopened = open_sqlite(&path);
        let actual = contents(&mut reopened);
        reopened.into_store().into_medium().close();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn snapshot_unlearn_restores_stored_state(prior in messages(), extra in messages()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayes.json");

        let mut classifier = open_snapshot(&path);
        learn_all(&mut classifier, &prior);
        classifier.store().unwrap();
        let expected = contents(&mut classifier);

        learn_all(&mut classifier, &extra);
        classifier.store().unwrap();
        unlearn_all(&mut classifier, &extra);
        classifier.store().unwrap();
        drop(classifier);

        let mut reopened = open_snapshot(&path);
        prop_assert_eq!(contents(&mut reopened), expected);
    }

    #[test]
    fn sqlite_unlearn_restores_stored_state(prior in messages(), extra in messages()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bayes.db");

        let mut classifier = open_sqlite(&path);
        learn_all(&mut classifier, &prior);
        classifier.store().unwrap();
        let expected = contents(&mut classifier);

        learn_all(&mut classifier, &extra);
        classifier.store().unwrap();
        unlearn_all(&mut classifier, &extra);
        classifier.store().unwrap();
        classifier.into_store().into_medium().close();

        let mut reopened = open_sqlite(&path);
        let actual = contents(&mut reopened);
        reopened.into_store().into_medium().close();
        prop_assert_eq!(actual, expected);
    }
}
