// src/services/theorem.rs

//! Main theorem extraction.
//!
//! Best-effort heuristic: find the first sentence containing a trigger
//! phrase ("we prove", "main theorem", ...) and keep it from the trigger to
//! the sentence end. A sentence announcing "the following" result pulls in
//! the next sentence as well. Nothing found is a normal outcome, never an
//! error.

use regex::{Regex, RegexBuilder};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::ExtractionConfig;

/// Extracts theorem statements from free text.
#[derive(Debug, Clone)]
pub struct TheoremExtractor {
    trigger: Option<Regex>,
    max_chars: usize,
    truncation_marker: String,
}

impl TheoremExtractor {
    /// Compile the configured trigger phrases.
    ///
    /// Phrases are literal text; words may be separated by any whitespace.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let alternatives: Vec<String> = config
            .patterns
            .iter()
            .map(|phrase| phrase_pattern(phrase))
            .filter(|alt| !alt.is_empty())
            .collect();

        let trigger = if alternatives.is_empty() {
            None
        } else {
            let pattern = format!("(?:{})", alternatives.join("|"));
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| AppError::config(format!("extraction.patterns: {e}")))?;
            Some(regex)
        };

        Ok(Self {
            trigger,
            max_chars: config.max_chars,
            truncation_marker: config.truncation_marker.clone(),
        })
    }

    /// Extract a statement from the abstract, falling back to the body text.
    pub fn extract(&self, abstract_text: &str, body: Option<&str>) -> Option<String> {
        self.extract_from(abstract_text)
            .or_else(|| body.and_then(|text| self.extract_from(text)))
    }

    fn extract_from(&self, text: &str) -> Option<String> {
        let trigger = self.trigger.as_ref()?;
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let sentences: Vec<&str> = text.split_sentence_bounds().collect();

        for (i, sentence) in sentences.iter().enumerate() {
            let Some(found) = trigger.find(sentence) else {
                continue;
            };

            let mut statement = sentence[found.start()..].trim().to_string();
            if announces_following(&sentence[found.end()..]) {
                if let Some(next) = sentences.get(i + 1) {
                    statement.push(' ');
                    statement.push_str(next.trim());
                }
            }
            return Some(self.truncate(statement));
        }
        None
    }

    /// Cap at `max_chars` user-perceived characters.
    fn truncate(&self, statement: String) -> String {
        let graphemes: Vec<&str> = statement.graphemes(true).collect();
        if graphemes.len() <= self.max_chars {
            return statement;
        }
        let mut cut = graphemes[..self.max_chars].concat();
        cut.truncate(cut.trim_end().len());
        cut.push_str(&self.truncation_marker);
        cut
    }
}

/// Regex for one trigger phrase: literal words separated by any whitespace,
/// anchored at word boundaries where the phrase starts or ends with a word
/// character.
fn phrase_pattern(phrase: &str) -> String {
    let body = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    if body.is_empty() {
        return body;
    }

    let trimmed = phrase.trim();
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let start = if is_word(trimmed.chars().next()) { r"\b" } else { "" };
    let end = if is_word(trimmed.chars().last()) { r"\b" } else { "" };
    format!("{start}{body}{end}")
}

/// Nouns that may close a sentence announcing the next one
/// ("we prove the following theorem.").
const ANNOUNCED: &[&str] = &[
    "theorem",
    "theorems",
    "result",
    "results",
    "statement",
    "statements",
    "proposition",
    "estimate",
    "formula",
];

/// Whether the rest of a trigger sentence defers the statement to what
/// comes next: it ends with a colon, with "following", or with
/// "following <theorem|result|...>".
fn announces_following(rest: &str) -> bool {
    let rest = rest.trim_end();
    if rest.ends_with(':') {
        return true;
    }
    let words: Vec<&str> = rest.unicode_words().collect();
    match words.as_slice() {
        [.., last] if last.eq_ignore_ascii_case("following") => true,
        [.., following, noun] => {
            following.eq_ignore_ascii_case("following")
                && ANNOUNCED.iter().any(|n| noun.eq_ignore_ascii_case(n))
        }
        _ => false,
    }
}
