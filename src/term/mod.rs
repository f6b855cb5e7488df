//! Term parser (C2).
//!
//! Splits text into normalised, stemmed, stop-word-filtered terms with
//! per-term weights, per spec §4.2. The identifier-splitting half of the
//! pipeline (break on case/underscore boundaries) is grounded on
//! `jamie8johnson-cqs/src/nl.rs`'s `tokenize_identifier`/`normalize_for_fts`
//! — both already emit only alphanumeric tokens, which is the same implicit
//! injection protection this crate wants for FTS5 `MATCH` queries. Stemming
//! is layered on via `rust-stemmers` (Porter/Snowball), the idiomatic crate
//! for this job; no example repo in the retrieval pack already depends on a
//! stemmer, so this is recorded as a deviation in DESIGN.md.

mod stopwords;

use std::collections::{HashMap, HashSet};

use rust_stemmers::{Algorithm, Stemmer};

/// Per-term parsing configuration (mirrors `Config`'s term-parser fields so
/// `Engine` can build one `TermParser` from its loaded `Config`).
#[derive(Debug, Clone)]
pub struct TermParserConfig {
    pub min_len: usize,
    pub max_len: usize,
    pub min_numeric_len: usize,
    pub enable_stemming: bool,
}

impl Default for TermParserConfig {
    fn default() -> Self {
        TermParserConfig {
            min_len: 3,
            max_len: 30,
            min_numeric_len: 5,
            enable_stemming: true,
        }
    }
}

/// Normalised-term producer. Not `Sync` by construction (the stemmer isn't),
/// so callers create one per thread/request — cheap, since it only wraps a
/// small stop-word set reference and a stemmer table.
pub struct TermParser {
    config: TermParserConfig,
    stop_words: HashSet<String>,
    stemmer: Stemmer,
}

impl TermParser {
    pub fn new(config: TermParserConfig) -> Self {
        TermParser {
            config,
            stop_words: stopwords::DEFAULT_STOP_WORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    pub fn with_stop_words(config: TermParserConfig, stop_words: HashSet<String>) -> Self {
        TermParser {
            config,
            stop_words,
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Parse `text`, returning a term → count map where each occurrence is
    /// weighted by `weight` (the property's configured weight per spec
    /// §3). Idempotent and deterministic for a fixed `(text, weight)` pair.
    pub fn parse(&self, text: &str, weight: u32) -> HashMap<String, u32> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for word in Self::unicode_words(text) {
            for term in self.normalise_word(&word) {
                *counts.entry(term).or_insert(0) += weight.max(1);
            }
        }
        counts
    }

    /// Break `text` on non-alphanumeric boundaries (the "Unicode break"
    /// step of spec §4.2 — word-boundary detection without pulling in a
    /// full UAX #29 segmenter, since none of the retrieved examples needed
    /// one either).
    fn unicode_words(text: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            if c.is_alphanumeric() {
                current.push(c);
            } else if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            words.push(current);
        }
        words
    }

    /// Apply lowercase/normalise, stop-word filter, length window, and
    /// optional stemming to one already-segmented word. Returns zero or one
    /// term (zero if filtered out).
    fn normalise_word(&self, word: &str) -> Option<String> {
        // NFD-ish fold: lowercase is the portable part of "lowercase+normalise"
        // without pulling in a full Unicode normalisation crate.
        let lower = word.to_lowercase();

        if lower.chars().all(|c| c.is_ascii_digit()) {
            return if self.config.min_numeric_len > 0 && lower.len() >= self.config.min_numeric_len
            {
                Some(lower)
            } else {
                None
            };
        }

        if lower.len() < self.config.min_len || lower.len() > self.config.max_len {
            return None;
        }
        if self.stop_words.contains(&lower) {
            return None;
        }

        let is_alphabetic = lower.chars().all(|c| c.is_alphabetic());
        if self.config.enable_stemming && is_alphabetic {
            Some(self.stemmer.stem(&lower).into_owned())
        } else {
            Some(lower)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TermParser {
        TermParser::new(TermParserConfig::default())
    }

    #[test]
    fn parse_is_idempotent() {
        let p = parser();
        let a = p.parse("alpha beta gamma", 1);
        let b = p.parse("alpha beta gamma", 1);
        assert_eq!(a, b);
    }

    #[test]
    fn stop_words_are_dropped() {
        let p = parser();
        let terms = p.parse("the quick fox", 1);
        assert!(!terms.contains_key("the"));
        assert!(terms.contains_key(&p.stemmer.stem("quick").into_owned()));
    }

    #[test]
    fn short_numeric_terms_are_dropped_long_ones_kept() {
        let p = parser();
        let terms = p.parse("42 12345", 1);
        assert!(!terms.contains_key("42"));
        assert!(terms.contains_key("12345"));
    }

    #[test]
    fn weight_multiplies_count() {
        let p = parser();
        let terms = p.parse("alpha alpha", 3);
        let key = p.stemmer.stem("alpha").into_owned();
        assert_eq!(terms.get(&key).copied(), Some(6));
    }

    #[test]
    fn stemming_collapses_related_forms() {
        let p = parser();
        let running = p.parse("running", 1);
        let run = p.parse("run", 1);
        let key_running: Vec<_> = running.keys().collect();
        let key_run: Vec<_> = run.keys().collect();
        assert_eq!(key_running, key_run);
    }
}
