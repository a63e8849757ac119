//! Stemmer + Tokenizer (`spec.md` §4.6). Deterministic text normalizer producing
//! the search keys the Metadata Store's inverted indices are keyed by. Load and
//! query paths both go through [`stems`] -- there is exactly one implementation.

mod error;
pub mod stopwords;

pub use error::TextError;

use std::sync::OnceLock;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_segmentation::UnicodeSegmentation;

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap())
}

fn time_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\d+:\d+(am|pm)?$").unwrap())
}

fn is_null_value(token: &str) -> bool {
    stopwords::NULL_VALUES.contains(&token)
}

fn is_stopword(token: &str) -> bool {
    let lower = token.to_lowercase();
    stopwords::ENGLISH_STOPWORDS.iter().any(|w| *w == lower)
}

fn is_rejected(token: &str) -> bool {
    token.chars().count() <= 1
        || is_null_value(token)
        || token.contains('/')
        || is_stopword(token)
        || numeric_re().is_match(token)
        || time_like_re().is_match(token)
}

/// Tokenizes and stems `input`, in order, dropping the tokens enumerated in
/// `spec.md` §4.6. Pinned to `rust_stemmers::Algorithm::English` (the Porter
/// algorithm), lowercased after stemming.
pub fn stems(input: &str) -> impl Iterator<Item = String> + '_ {
    let stemmer = Stemmer::create(Algorithm::English);
    input
        .unicode_words()
        .filter(|tok| !is_rejected(tok))
        .map(move |tok| stemmer.stem(&tok.to_lowercase()).into_owned())
}

/// The first stem a [`stems`] call would yield for `input`, or `None` if every
/// token was rejected. Used by `query::set_expr` to resolve a `NAME` (`spec.md`
/// §4.7: "the first stem produced is used").
pub fn first_stem(input: &str) -> Option<String> {
    stems(input).next()
}

/// Rejects metadata values containing the reserved path delimiter. See
/// `SPEC_FULL.md` §3 for why this implementation rejects rather than
/// percent-encodes.
pub fn reject_path_delimiter(value: &str) -> Result<(), TextError> {
    if value.contains('/') {
        Err(TextError::PathDelimiter(value.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_the_spec_example_sentence() {
        let s: Vec<String> = stems("the lazy fox jumped over 12 fences").collect();
        assert_eq!(s, vec!["lazi", "fox", "jump", "fenc"]);
    }

    #[test]
    fn drops_time_like_tokens() {
        let s: Vec<String> = stems("meeting at 10:30am tomorrow").collect();
        assert!(!s.iter().any(|t| t.contains("10")));
    }

    #[test]
    fn drops_null_values_and_slashes() {
        assert!(first_stem("Unknown").is_none());
        let s: Vec<String> = stems("gut/oral swab").collect();
        assert!(!s.contains(&"gut/oral".to_string()));
    }

    #[test]
    fn single_char_tokens_are_dropped() {
        let s: Vec<String> = stems("a b antibiotics").collect();
        assert_eq!(s, vec!["antibiot"]);
    }

    #[test]
    fn path_delimiter_rejected() {
        assert!(reject_path_delimiter("gut/oral").is_err());
        assert!(reject_path_delimiter("3.5").is_ok());
    }
}
