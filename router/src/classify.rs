//! Query classification: complexity, plus an advisory intent
//! tag that never affects scoring.

use thane_core::Complexity;

const RETRIEVAL_PREFIXES: &[&str] = &["search ", "read ", "list ", "fetch ", "find ", "check "];
const COMPLEX_WORDS: &[&str] = &[
    "explain", "why", "analyze", "compare", "history", "pattern", "trend", "recommend",
];
const SIMPLE_PATTERNS: &[&str] = &[
    "turn on", "turn off", "set ", "lock", "unlock", "open ", "close ",
];

/// Classifies `query` into a `Complexity`. Order matters: a
/// retrieval prefix always wins over a complex word ("search archives for X
/// history" is simple), and a complex word always wins over a simple
/// pattern ("why did the lights turn on" is complex).
pub fn classify_complexity(query: &str) -> Complexity {
    let q = query.to_lowercase();

    if RETRIEVAL_PREFIXES.iter().any(|p| q.starts_with(p)) {
        return Complexity::Simple;
    }
    if COMPLEX_WORDS.iter().any(|w| q.contains(w)) {
        return Complexity::Complex;
    }
    if SIMPLE_PATTERNS.iter().any(|p| q.contains(p)) {
        return Complexity::Simple;
    }
    if q.contains('?') || q.starts_with("is ") || q.starts_with("what") {
        return Complexity::Moderate;
    }
    Complexity::Moderate
}

/// Advisory intent tag. Does not affect scoring; it
/// exists purely so a `RoutingDecision`'s reasoning can say something more
/// specific than "moderate complexity".
pub fn classify_intent(query: &str) -> String {
    let q = query.to_lowercase();

    if RETRIEVAL_PREFIXES.iter().any(|p| q.starts_with(p)) {
        return "retrieval".to_string();
    }
    if COMPLEX_WORDS.iter().any(|w| q.contains(w)) {
        return "analysis".to_string();
    }
    if SIMPLE_PATTERNS.iter().any(|p| q.contains(p)) {
        return "command".to_string();
    }
    if q.contains('?') || q.starts_with("is ") || q.starts_with("what") {
        return "question".to_string();
    }
    "general".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        let cases: Vec<(&str, Complexity)> = vec![
            (
                "search IRC archives for distributed.net history",
                Complexity::Simple,
            ),
            ("why did the lights turn on at 3am", Complexity::Complex),
            ("turn on the office light", Complexity::Simple),
            ("what is the temperature outside?", Complexity::Moderate),
        ];

        for (query, expected) in cases {
            assert_eq!(
                classify_complexity(query),
                expected,
                "query {query:?} expected {expected:?}"
            );
        }
    }

    #[test]
    fn retrieval_prefix_beats_complex_word() {
        assert_eq!(
            classify_complexity("search archives for something"),
            Complexity::Simple
        );
    }

    #[test]
    fn complex_word_beats_simple_pattern() {
        assert_eq!(
            classify_complexity("explain why the lock turned on"),
            Complexity::Complex
        );
    }

    #[test]
    fn bare_statement_is_moderate() {
        assert_eq!(classify_complexity("tell me a story"), Complexity::Moderate);
    }
}
