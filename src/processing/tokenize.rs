//! Word and sentence tokenization shared by the summarizer and keyword extractor.
//!
//! Only alphanumeric word tokens ever carry weight, so the word tokenizer yields just those:
//! surrounding punctuation is stripped, a trailing contraction (`n't`, `'s`, `'re`, ...) is split
//! off its stem, and any token still holding a non-alphanumeric character (`well-known`, `3.5`)
//! is dropped.

use regex::Regex;
use std::sync::OnceLock;

const CONTRACTION_SUFFIXES: [&str; 6] = ["s", "re", "ve", "ll", "d", "m"];

fn sentence_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| {
        Regex::new(r#"[.!?]+["'”’)\]]*\s+"#).expect("sentence boundary pattern is valid")
    })
}

/// Split `text` into trimmed, non-empty sentences.
///
/// A sentence ends at a run of `.`, `!` or `?` (optionally followed by closing quotes or
/// brackets) that is followed by whitespace, or at the end of the text.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in sentence_boundary().find_iter(text) {
        let sentence = text[start..boundary.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Alphanumeric word tokens of `text`, case preserved.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace().filter_map(|chunk| {
        let core = chunk.trim_matches(|c: char| !c.is_alphanumeric());
        let stem = strip_contraction(core);
        (!stem.is_empty() && stem.chars().all(char::is_alphanumeric)).then_some(stem)
    })
}

fn strip_contraction(token: &str) -> &str {
    let lower_suffix = |len: usize| {
        token
            .get(token.len().saturating_sub(len)..)
            .map(str::to_lowercase)
    };
    if token.len() > 3 && lower_suffix(3).as_deref() == Some("n't") {
        return &token[..token.len() - 3];
    }
    match token.rfind('\'') {
        Some(index) if index > 0 => {
            let suffix = token[index + 1..].to_lowercase();
            if CONTRACTION_SUFFIXES.contains(&suffix.as_str()) {
                &token[..index]
            } else {
                token
            }
        }
        _ => token,
    }
}

/// Count of single-space-delimited pieces, the measure used by the sentence length filter.
///
/// Consecutive spaces yield empty pieces that still count, and other whitespace does not split.
pub fn space_delimited_len(sentence: &str) -> usize {
    sentence.split(' ').count()
}
