use std::{fs, sync::Arc};

use bayes_spam::{
    classifier::Classifier,
    config::{ClassifierConfig, FilterConfig},
    domain::Disposition,
    filter::Filter,
    storage::{IncrementalStore, SqliteMedium},
    tokenizer::{MailTokenizer, SharedTokenizer},
    training::{self, collect_messages, CorpusObserver, Trainer},
};

const SPAMS: &[&str] = &[
    "From: winner@lotto.example\nSubject: You won the lottery\n\nClaim your prize money now, click http://lotto.example/claim\n",
    "From: deals@pharmacy.example\nSubject: cheap pills online\n\nBest prices on pills, click http://pharmacy.example/buy now\n",
    "From: promo@casino.example\nSubject: free casino bonus\n\nFree bonus money waiting, click http://casino.example/join\n",
];

const HAMS: &[&str] = &[
    "From: alice@corp.example\nSubject: meeting notes\n\nAttached are the notes from this morning's meeting.\n",
    "From: bob@corp.example\nSubject: lunch tomorrow?\n\nShall we grab lunch tomorrow after the design review?\n",
    "From: carol@corp.example\nSubject: quarterly report draft\n\nThe quarterly report draft is ready for your review.\n",
];

#[test]
fn trains_from_directories_and_filters_new_mail() {
    let dir = tempfile::tempdir().unwrap();
    let spam_dir = dir.path().join("spam");
    let ham_dir = dir.path().join("ham");
    fs::create_dir(&spam_dir).unwrap();
    fs::create_dir(&ham_dir).unwrap();
    for (index, raw) in SPAMS.iter().enumerate() {
        fs::write(spam_dir.join(format!("{index}.eml")), raw).unwrap();
    }
    for (index, raw) in HAMS.iter().enumerate() {
        fs::write(ham_dir.join(format!("{index}.eml")), raw).unwrap();
    }

    let tokenizer: SharedTokenizer = Arc::new(MailTokenizer::default());
    let medium = SqliteMedium::open(&dir.path().join("bayes.db")).unwrap();
    let config = ClassifierConfig {
        min_prob_strength: 0.1,
        ..Default::default()
    };
    let shared = training::shared(
        Classifier::open(IncrementalStore::new(medium), config).unwrap(),
    );

    let spam = collect_messages(&[&spam_dir], &tokenizer).unwrap();
    let ham = collect_messages(&[&ham_dir], &tokenizer).unwrap();
    assert_eq!(Trainer::spam(shared.clone()).train_all(&spam).unwrap(), 3);
    assert_eq!(Trainer::ham(shared.clone()).train_all(&ham).unwrap(), 3);

    let filter = Filter::new(shared.clone(), tokenizer.clone(), FilterConfig::default());
    let incoming_spam = "From: offers@casino.example\nSubject: free money bonus\n\nClick now to claim free money at http://casino.example/win\n";
    let incoming_ham = "From: dave@corp.example\nSubject: review meeting tomorrow\n\nCan we move the review meeting to tomorrow morning?\n";

    let spam_prob = filter.classify(incoming_spam).unwrap();
    let ham_prob = filter.classify(incoming_ham).unwrap();
    assert_eq!(filter.disposition(spam_prob), Disposition::Spam, "{spam_prob}");
    assert_eq!(filter.disposition(ham_prob), Disposition::Ham, "{ham_prob}");

    let stamped = filter.filter(incoming_spam, false).unwrap();
    assert!(stamped.starts_with("X-Spambayes-Classification: spam; "));
    assert!(stamped.ends_with(incoming_spam));

    // A message moved out of the spam corpus is forgotten again.
    let trainer = Trainer::spam(shared.clone());
    trainer.on_message_removed(&spam[2]).unwrap();
    let mut classifier = shared.lock();
    assert_eq!(classifier.nspam(), 2);
    assert_eq!(classifier.record("subject:casino").unwrap(), None);
}
