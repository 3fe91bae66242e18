//! Frequency-based extractive summarizer.
//!
//! Word frequencies are counted over the original, case-preserved text. Each sentence is then
//! lowercased and scored by summing the frequency of every token that appears verbatim in that
//! table, so a word contributes only if its lowercase form also occurs somewhere in the text.
//! Sentences with 30 or more space-delimited pieces never accrue score. Scores are keyed by
//! sentence text, so repeated sentences accumulate into a single entry.
//!
//! The summary lists the top sentences by descending score, ties kept in the order the
//! sentences were first scored. It is not restored to document order.

use std::collections::HashMap;

use super::tokenize::{self, space_delimited_len};

/// Sentences kept in a summary unless configured otherwise.
pub const DEFAULT_SUMMARY_SENTENCES: usize = 5;

/// Sentences with at least this many space-delimited pieces are not scored.
pub const MAX_SCORED_SENTENCE_LEN: usize = 30;

/// A sentence and its accumulated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredSentence<'a> {
    /// Sentence text as it appears in the document.
    pub text: &'a str,
    /// Sum of frequency-table hits over its tokens.
    pub score: u64,
}

/// Extractive summarizer selecting the highest-scoring sentences.
#[derive(Debug, Clone, Copy)]
pub struct Summarizer {
    max_sentences: usize,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_SENTENCES)
    }
}

impl Summarizer {
    /// Build a summarizer keeping at most `max_sentences` sentences.
    pub const fn new(max_sentences: usize) -> Self {
        Self { max_sentences }
    }

    /// Join the top-ranked sentences with single spaces. Empty when nothing scores.
    pub fn summarize(&self, text: &str) -> String {
        rank_sentences(text)
            .into_iter()
            .take(self.max_sentences)
            .map(|sentence| sentence.text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Every scoring sentence ordered by descending score, ties in first-scored order.
pub fn rank_sentences(text: &str) -> Vec<ScoredSentence<'_>> {
    let mut frequencies: HashMap<&str, u64> = HashMap::new();
    for word in tokenize::words(text) {
        *frequencies.entry(word).or_insert(0) += 1;
    }

    let mut scored: Vec<ScoredSentence<'_>> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for sentence in tokenize::sentences(text) {
        if space_delimited_len(sentence) >= MAX_SCORED_SENTENCE_LEN {
            continue;
        }
        let lowered = sentence.to_lowercase();
        let mut hits: Option<u64> = None;
        for word in tokenize::words(&lowered) {
            if let Some(frequency) = frequencies.get(word) {
                *hits.get_or_insert(0) += frequency;
            }
        }
        let Some(hits) = hits else {
            continue;
        };
        match positions.get(sentence) {
            Some(&index) => scored[index].score += hits,
            None => {
                positions.insert(sentence, scored.len());
                scored.push(ScoredSentence {
                    text: sentence,
                    score: hits,
                });
            }
        }
    }

    scored.sort_by(|left, right| right.score.cmp(&left.score));
    scored
}
