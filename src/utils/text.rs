// src/utils/text.rs

//! Text helpers shared by the normalizer and the skill extractor.

use std::collections::BTreeSet;

use unicode_segmentation::UnicodeSegmentation;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lower-case and collapse whitespace.
pub fn fold(s: &str) -> String {
    normalize_whitespace(&s.to_lowercase())
}

/// Whether `needle` occurs in `haystack` as a whole term.
///
/// Both arguments must already be lower-cased. A term boundary is any
/// character that is not alphanumeric, `_`, `+` or `#`; a `.` counts as a
/// boundary only when it is not glued to a word on its far side, so `r`
/// does not match inside `regression` and `js` does not match inside
/// `node.js`, while `c++` and `python.` still match.
pub fn contains_term(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack
        .match_indices(needle)
        .any(|(start, _)| left_boundary(haystack, start) && right_boundary(haystack, start + needle.len()))
}

fn is_term_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '+' | '#')
}

fn left_boundary(text: &str, start: usize) -> bool {
    let mut before = text[..start].chars().rev();
    match before.next() {
        None => true,
        Some(c) if is_term_char(c) => false,
        Some('.') => !before.next().is_some_and(char::is_alphanumeric),
        Some(_) => true,
    }
}

fn right_boundary(text: &str, end: usize) -> bool {
    let mut after = text[end..].chars();
    match after.next() {
        None => true,
        Some(c) if is_term_char(c) => false,
        Some('.') => !after.next().is_some_and(char::is_alphanumeric),
        Some(_) => true,
    }
}

/// Lower-cased Unicode words of `s`.
pub fn token_set(s: &str) -> BTreeSet<String> {
    s.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Jaccard overlap of the word sets of `a` and `b`.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let left = token_set(a);
    let right = token_set(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    shared as f64 / union as f64
}

/// Similarity in `[0, 1]`: the better of Jaro-Winkler and word overlap.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = fold(a);
    let b = fold(b);
    strsim::jaro_winkler(&a, &b).max(token_overlap(&a, &b))
}
