//! Bag-of-words similarity used by the relevance gate

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Word frequencies of a text
pub type WordVector = HashMap<String, usize>;

/// Split text into `\w+` tokens; case is preserved
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    WORD.find_iter(text).map(|m| m.as_str())
}

pub fn text_to_vector(text: &str) -> WordVector {
    let mut vector = WordVector::new();
    for word in tokenize(text) {
        *vector.entry(word.to_string()).or_default() += 1;
    }
    vector
}

/// Cosine similarity of two word-frequency vectors
///
/// `None` when either vector is empty, since the similarity is undefined.
pub fn cosine(v1: &WordVector, v2: &WordVector) -> Option<f64> {
    if v1.is_empty() || v2.is_empty() {
        return None;
    }

    let numerator: usize = v1
        .iter()
        .filter_map(|(word, count)| v2.get(word).map(|other| count * other))
        .sum();
    let sum1: usize = v1.values().map(|c| c * c).sum();
    let sum2: usize = v2.values().map(|c| c * c).sum();

    Some(numerator as f64 / ((sum1 as f64).sqrt() * (sum2 as f64).sqrt()))
}
