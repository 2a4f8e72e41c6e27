use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::{TokenStream, Tokenizer};

static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("valid word regex"));
static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(https?|ftp)://\S+").expect("valid url regex"));

const TOKENIZED_HEADERS: &[&str] = &[
    "subject",
    "from",
    "to",
    "cc",
    "reply-to",
    "return-path",
    "content-type",
    "x-mailer",
];

/// Default tokenizer for RFC 822 style messages.
///
/// Headers produce `header:<name>` plus `<name>:<word>` for a handful of
/// informative headers. Body words between `min_word_len` and `max_word_len`
/// characters are emitted lowercased; longer words collapse into
/// `skip:<first char> <length bucket>`; URLs are broken into scheme, host
/// labels and path segments.
#[derive(Debug, Clone)]
pub struct MailTokenizer {
    pub min_word_len: usize,
    pub max_word_len: usize,
}

impl Default for MailTokenizer {
    fn default() -> Self {
        Self {
            min_word_len: 3,
            max_word_len: 12,
        }
    }
}

impl Tokenizer for MailTokenizer {
    fn tokenize<'a>(&'a self, raw: &'a str) -> TokenStream<'a> {
        let (headers, body) = split_message(raw);
        let header_tokens = self.header_tokens(headers);
        let body_tokens = WORD_REGEX
            .find_iter(body)
            .flat_map(move |word| self.body_word_tokens(word.as_str()));
        Box::new(header_tokens.into_iter().chain(body_tokens))
    }
}

impl MailTokenizer {
    fn header_tokens(&self, headers: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for (name, value) in unfold_headers(headers) {
            tokens.push(format!("header:{name}"));
            if !TOKENIZED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            for word in WORD_REGEX.find_iter(&value) {
                if let Some(word) = self.normalize_word(word.as_str()) {
                    tokens.push(format!("{name}:{word}"));
                }
            }
        }
        tokens
    }

    fn body_word_tokens(&self, raw_word: &str) -> Vec<String> {
        if URL_REGEX.is_match(raw_word) {
            return url_tokens(raw_word);
        }
        let word = trim_punctuation(raw_word).to_lowercase();
        if let Some((name, domain)) = word.split_once('@') {
            if !name.is_empty() && domain.contains('.') {
                return vec![format!("email name:{name}"), format!("email addr:{domain}")];
            }
        }
        let len = word.chars().count();
        if len < self.min_word_len {
            Vec::new()
        } else if len <= self.max_word_len {
            vec![word]
        } else {
            let first = word.chars().next().unwrap_or('?');
            vec![format!("skip:{first} {}", len / 10 * 10)]
        }
    }

    fn normalize_word(&self, raw: &str) -> Option<String> {
        let word = trim_punctuation(raw).to_lowercase();
        let len = word.chars().count();
        (len >= 1 && len <= self.max_word_len).then_some(word)
    }
}

fn split_message(raw: &str) -> (&str, &str) {
    for separator in ["\r\n\r\n", "\n\n"] {
        if let Some(index) = raw.find(separator) {
            return (&raw[..index], &raw[index + separator.len()..]);
        }
    }
    if looks_like_header(raw.lines().next().unwrap_or_default()) {
        (raw, "")
    } else {
        ("", raw)
    }
}

fn looks_like_header(line: &str) -> bool {
    match line.split_once(':') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        }
        None => false,
    }
}

fn unfold_headers(headers: &str) -> Vec<(String, String)> {
    let mut unfolded: Vec<(String, String)> = Vec::new();
    for line in headers.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = unfolded.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if looks_like_header(line) {
                unfolded.push((name.trim().to_lowercase(), value.trim().to_string()));
            }
        }
    }
    unfolded
}

fn url_tokens(raw: &str) -> Vec<String> {
    let cleaned = trim_punctuation(raw);
    let Ok(url) = Url::parse(cleaned) else {
        return vec!["url:unparseable".to_string()];
    };
    let mut tokens = vec![format!("proto:{}", url.scheme())];
    if let Some(host) = url.host_str() {
        tokens.extend(host.split('.').filter(|label| !label.is_empty()).map(|label| format!("url:{label}")));
    }
    if let Some(segments) = url.path_segments() {
        tokens.extend(
            segments
                .filter(|segment| !segment.is_empty())
                .map(|segment| format!("url:{}", segment.to_lowercase())),
        );
    }
    tokens
}

fn trim_punctuation(word: &str) -> &str {
    word.trim_matches(|ch: char| !ch.is_alphanumeric() && !matches!(ch, '$' | '%' | '/'))
}
