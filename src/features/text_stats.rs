use super::syllables;
use serde::{Deserialize, Serialize};

/// Basic statistics over one text field.
///
/// Computed once per field during extraction; every value is a pure function
/// of the text and the token sequence derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TextStats {
    pub chars: usize,
    pub words: usize,
    pub sentences: usize,
    pub syllables: usize,
    pub avg_sentence_length: f64,
    pub avg_syllables_per_word: f64,
}

impl TextStats {
    /// Computes statistics for `text` given its word tokens.
    #[must_use]
    pub fn compute(text: &str, tokens: &[String]) -> Self {
        let chars = text.chars().count();
        let words = tokens.len();
        let sentences = count_sentences(text);
        let syllables = syllables::count_words(tokens.iter().map(String::as_str));

        let avg_sentence_length = if sentences == 0 { 0.0 } else { words as f64 / sentences as f64 };
        let avg_syllables_per_word = if words == 0 { 0.0 } else { syllables as f64 / words as f64 };

        Self {
            chars,
            words,
            sentences,
            syllables,
            avg_sentence_length,
            avg_syllables_per_word,
        }
    }
}

/// Counts sentences by terminator runs (`.`, `!`, `?`).
///
/// Trailing text without a terminator still counts as a sentence, and a run
/// of terminators ("Wait...") counts once.
fn count_sentences(text: &str) -> usize {
    let mut count = 0;
    let mut in_sentence = false;
    for c in text.chars() {
        if matches!(c, '.' | '!' | '?') {
            if in_sentence {
                count += 1;
                in_sentence = false;
            }
        } else if !c.is_whitespace() {
            in_sentence = true;
        }
    }
    if in_sentence {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn counts_sentences_by_terminators() {
        assert_eq!(count_sentences("One. Two! Three?"), 3);
        assert_eq!(count_sentences("No terminator"), 1);
        assert_eq!(count_sentences("Wait... what?"), 2);
        assert_eq!(count_sentences(""), 0);
        assert_eq!(count_sentences("   "), 0);
    }

    #[test]
    fn averages_over_words_and_sentences() {
        let toks = tokens(&["the", "cat", "sat", "here", "it", "slept"]);
        let stats = TextStats::compute("The cat sat here. It slept.", &toks);

        assert_eq!(stats.words, 6);
        assert_eq!(stats.sentences, 2);
        assert!((stats.avg_sentence_length - 3.0).abs() < f64::EPSILON);
        assert!(stats.avg_syllables_per_word >= 1.0);
    }

    #[test]
    fn empty_text_yields_zeroes() {
        let stats = TextStats::compute("", &[]);
        assert_eq!(stats.words, 0);
        assert_eq!(stats.sentences, 0);
        assert!(stats.avg_sentence_length.abs() < f64::EPSILON);
        assert!(stats.avg_syllables_per_word.abs() < f64::EPSILON);
    }

    #[test]
    fn compute_is_deterministic() {
        let toks = tokens(&["hello", "world"]);
        let a = TextStats::compute("Hello world.", &toks);
        let b = TextStats::compute("Hello world.", &toks);
        assert_eq!(a, b);
    }
}
