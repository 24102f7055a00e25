//! Compiled keyword and crisis patterns.

use regex::{Regex, RegexBuilder};
use sylva_catalog::CatalogError;

/// Weight of a single-word keyword.
pub const WORD_WEIGHT: u32 = 1;

/// Weight of a multi-word phrase keyword.
pub const PHRASE_WEIGHT: u32 = 2;

/// A routing keyword compiled to a word-boundary pattern.
///
/// Words inside a phrase may be separated by any run of whitespace.
/// Boundaries are only asserted next to word characters, so a keyword
/// such as `don't` still matches at its edges.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    keyword: String,
    weight: u32,
    regex: Regex,
}

impl KeywordPattern {
    /// Compile a keyword. Matching is done against lower-cased text.
    pub fn compile(keyword: &str) -> Result<Self, CatalogError> {
        let words: Vec<String> = keyword
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();

        let (first, last) = match (words.first(), words.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(CatalogError::InvalidPattern {
                    kind: "keyword",
                    pattern: keyword.to_string(),
                    reason: "keyword is blank".to_string(),
                })
            }
        };

        let leading = if starts_with_word_char(first) { r"\b" } else { "" };
        let trailing = if ends_with_word_char(last) { r"\b" } else { "" };
        let body = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join(r"\s+");

        let regex = Regex::new(&format!("{}{}{}", leading, body, trailing)).map_err(|e| {
            CatalogError::InvalidPattern {
                kind: "keyword",
                pattern: keyword.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            keyword: words.join(" "),
            weight: if words.len() > 1 { PHRASE_WEIGHT } else { WORD_WEIGHT },
            regex,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn is_phrase(&self) -> bool {
        self.weight == PHRASE_WEIGHT
    }

    /// Whether the keyword occurs in already lower-cased text.
    pub fn is_match(&self, lowered: &str) -> bool {
        self.regex.is_match(lowered)
    }
}

/// Compile a case-insensitive pattern from catalog data.
pub(crate) fn compile_pattern(kind: &'static str, pattern: &str) -> Result<Regex, CatalogError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| CatalogError::InvalidPattern {
            kind,
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn starts_with_word_char(word: &str) -> bool {
    word.chars().next().is_some_and(is_word_char)
}

fn ends_with_word_char(word: &str) -> bool {
    word.chars().last().is_some_and(is_word_char)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_boundary() {
        let cat = KeywordPattern::compile("cat").unwrap();
        assert!(cat.is_match("the cat sleeps"));
        assert!(cat.is_match("cat."));
        assert!(!cat.is_match("a category of things"));
        assert!(!cat.is_match("concatenate"));
    }

    #[test]
    fn test_phrase_weight_and_spacing() {
        let phrase = KeywordPattern::compile("Out of  Control").unwrap();
        assert_eq!(phrase.keyword(), "out of control");
        assert_eq!(phrase.weight(), PHRASE_WEIGHT);
        assert!(phrase.is_phrase());
        assert!(phrase.is_match("everything is out   of control"));
        assert!(!phrase.is_match("out of controller range"));

        let word = KeywordPattern::compile("hollow").unwrap();
        assert_eq!(word.weight(), WORD_WEIGHT);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let odd = KeywordPattern::compile("c++").unwrap();
        assert!(odd.is_match("i write c++ all day"));
        assert!(!odd.is_match("i write c all day"));
    }

    #[test]
    fn test_blank_keyword_rejected() {
        assert!(matches!(
            KeywordPattern::compile("   "),
            Err(CatalogError::InvalidPattern { kind: "keyword", .. })
        ));
    }

    #[test]
    fn test_compile_pattern_case_insensitive() {
        let re = compile_pattern("crisis", r"\bhurt\s+myself\b").unwrap();
        assert!(re.is_match("I Want To HURT   myself"));
        assert!(compile_pattern("crisis", "(unclosed").is_err());
    }
}
