//! Frequency-ranked keyword extraction over lowercase, non-stop-word tokens.

use std::collections::HashMap;

use super::{stopwords::is_stop_word, tokenize};

/// Keywords returned per document unless configured otherwise.
pub const DEFAULT_KEYWORD_COUNT: usize = 5;

/// Picks the most frequent content words of a text.
#[derive(Debug, Clone, Copy)]
pub struct KeywordExtractor {
    count: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORD_COUNT)
    }
}

impl KeywordExtractor {
    /// Build an extractor returning at most `count` keywords.
    pub const fn new(count: usize) -> Self {
        Self { count }
    }

    /// Top keywords in rank order; frequency ties keep first-encountered order.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut counts: Vec<(&str, u64)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for word in tokenize::words(&lowered).filter(|word| !is_stop_word(word)) {
            match positions.get(word) {
                Some(&index) => counts[index].1 += 1,
                None => {
                    positions.insert(word, counts.len());
                    counts.push((word, 1));
                }
            }
        }

        counts.sort_by(|left, right| right.1.cmp(&left.1));
        counts
            .into_iter()
            .take(self.count)
            .map(|(word, _)| word.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_resolve_by_first_occurrence() {
        let keywords = KeywordExtractor::new(2).extract("cat dog cat dog bird");
        assert_eq!(keywords, vec!["cat", "dog"]);
    }

    #[test]
    fn excludes_stop_words_and_respects_limit() {
        let text = "The cats and the dogs are in the garden. The cats sleep while the dogs play.";
        let keywords = KeywordExtractor::new(3).extract(text);
        assert_eq!(keywords, vec!["cats", "dogs", "garden"]);
        assert!(keywords.iter().all(|word| !is_stop_word(word)));
    }

    #[test]
    fn returns_all_when_fewer_than_requested() {
        let keywords = KeywordExtractor::default().extract("Rust rust RUST compiler");
        assert_eq!(keywords, vec!["rust", "compiler"]);
    }

    #[test]
    fn ranks_scenario_text() {
        let keywords =
            KeywordExtractor::new(3).extract("Cats are nice. Dogs are nice too. Birds fly high.");
        assert_eq!(keywords, vec!["nice", "cats", "dogs"]);
    }

    #[test]
    fn stop_word_only_text_has_no_keywords() {
        assert!(KeywordExtractor::default().extract("the and of to").is_empty());
    }
}
