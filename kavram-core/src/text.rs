//! Text heuristics - normalization, edit distance, overlap and stemming
//!
//! None of this claims linguistic correctness. These are the small,
//! deterministic scoring functions the grid, the activation engine and
//! the arbiter share.

use std::collections::HashSet;

/// Interrogative words (Turkish and English) used for category tagging
/// and question-pattern detection
pub const QUESTION_WORDS: &[&str] = &[
    "ne", "neler", "nedir", "nerede", "nereye", "nereden", "neresi", "kim", "kimdir",
    "nasıl", "neden", "niye", "niçin", "hangi", "kaç", "mi", "mı", "mu", "mü",
    "what", "where", "who", "whom", "how", "why", "when", "which",
];

/// Suffixes stripped by [`stem`], longest first
const SUFFIXES: &[&str] = &[
    "ler", "lar", "dir", "dır", "dur", "dür", "tir", "tır", "tur", "tür", "den", "dan", "ten",
    "tan", "nin", "nın", "nun", "nün", "'s", "es", "de", "da", "te", "ta", "in", "ın", "un",
    "ün", "s", "i", "ı", "u", "ü", "e", "a",
];

/// A stem must keep at least this many characters
const MIN_STEM_CHARS: usize = 3;

/// Split text into normalized tokens
///
/// Lower-cases, splits on whitespace and trims punctuation from both ends
/// of every token. Empty tokens are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Normalized form of a whole text (tokens joined by single spaces)
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Character-level Levenshtein distance
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized edit similarity in [0, 1] (1.0 = identical)
pub fn similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / longest as f32
}

/// Jaccard overlap of two token sequences, treated as sets
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f32 {
    let set_a: HashSet<&str> = a.iter().map(|s| s.as_ref()).collect();
    let set_b: HashSet<&str> = b.iter().map(|s| s.as_ref()).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f32 / union as f32
}

/// Jaccard overlap of two raw texts
pub fn text_jaccard(a: &str, b: &str) -> f32 {
    jaccard(&tokenize(a), &tokenize(b))
}

/// Strip one morphological suffix, keeping at least three characters
///
/// `meyvedir` → `meyve`, `kitaplar` → `kitap`, `boxes` → `box`.
pub fn stem(token: &str) -> &str {
    for suffix in SUFFIXES {
        if let Some(rest) = token.strip_suffix(suffix) {
            if rest.chars().count() >= MIN_STEM_CHARS {
                return rest;
            }
        }
    }
    token
}

/// Whether two tokens plausibly share a stem
///
/// Either token may already be a stem of the other, so `meyve` and
/// `meyvedir` match even though `stem("meyve")` strips its final vowel.
pub fn same_stem(a: &str, b: &str) -> bool {
    a == b || stem(a) == b || stem(b) == a || stem(a) == stem(b)
}

/// Whether a token is an interrogative word
pub fn is_question_word(token: &str) -> bool {
    QUESTION_WORDS.contains(&token)
}
