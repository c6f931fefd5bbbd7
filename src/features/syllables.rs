//! Heuristic syllable counting for English-like text.
//!
//! Counts vowel groups after stripping non-letters and a trailing silent `e`,
//! with a floor of one syllable per non-empty word. The heuristic is cheap and
//! deterministic; it is not a pronunciation dictionary and does not need to be.

/// Counts syllables in a single word.
#[must_use]
pub fn count_word(word: &str) -> usize {
    let normalized: String = word.trim().to_lowercase().chars().filter(|c: &char| c.is_alphabetic()).collect();
    if normalized.is_empty() {
        return 0;
    }

    // Trailing `e` is usually silent ("score", "side"); drop it unless it is
    // the whole word.
    let trimmed = if normalized.len() > 1 && normalized.ends_with('e') {
        &normalized[..normalized.len() - 1]
    } else {
        &normalized
    };

    let groups = trimmed
        .split(|c: char| !is_vowel(c))
        .filter(|group| !group.is_empty())
        .count();
    groups.max(1)
}

/// Sums syllable counts over a word sequence, skipping blank entries.
#[must_use]
pub fn count_words<'a>(words: impl IntoIterator<Item = &'a str>) -> usize {
    words
        .into_iter()
        .filter(|w| !w.trim().is_empty())
        .map(count_word)
        .sum()
}

const fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}
