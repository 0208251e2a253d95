//! Regex-based text helpers shared by the scorers.

use regex::Regex;
use std::sync::OnceLock;

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\w+").expect("valid regex"))
}

/// Opening fence (with optional info string) must end its line; the block
/// runs lazily to the next triple backtick.
pub fn code_fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```[^`\n]*\n.*?```").expect("valid regex"))
}

/// Single-backtick span on one line. Longer backtick runs are not balanced.
pub fn code_fragment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"`[^`\n]+`").expect("valid regex"))
}

pub fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"https?://[^\s<>()\[\]"'`]+"#).expect("valid regex"))
}

pub fn issue_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#\d+").expect("valid regex"))
}

/// Number of `\w+` tokens in `text`.
pub fn count_words(text: &str) -> usize {
    word_pattern().find_iter(text).count()
}

/// The stretches of `text` that lie outside closed code fences.
pub fn outside_code_fences(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for fence in code_fence_pattern().find_iter(text) {
        segments.push(&text[start..fence.start()]);
        start = fence.end();
    }
    segments.push(&text[start..]);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("Looks good, ship it!"), 4);
        assert_eq!(count_words("snake_case counts once"), 3);
        assert_eq!(count_words("don't"), 2);
    }

    #[test]
    fn test_count_words_blank() {
        assert_eq!(count_words(""), 0);
        assert_eq!(count_words("   \n\t "), 0);
        assert_eq!(count_words("--- ... !!!"), 0);
    }

    #[test]
    fn test_outside_code_fences_skips_fenced_blocks() {
        let segments = outside_code_fences("before\n```rust\nlet `x` = 1;\n```\nafter `y`");
        assert_eq!(segments, vec!["before\n", "\nafter `y`"]);
    }

    #[test]
    fn test_outside_code_fences_without_fences() {
        assert_eq!(outside_code_fences("```\nunterminated"), vec!["```\nunterminated"]);
    }
}
