//! One user search: pattern, settings snapshot and accumulated results.

use crate::settings::{CaseSensitivity, SearchSettings};
use crate::types::RecordId;

/// One whitespace-delimited unit of the pattern, pre-processed for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    text: String,
    folded: String,
    chars: Vec<char>,
}

impl Token {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            folded: text.to_lowercase(),
            chars: text.chars().collect(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Lowercased form used by the case-insensitive substring test.
    #[must_use]
    pub fn folded(&self) -> &str {
        &self.folded
    }

    #[must_use]
    pub fn chars(&self) -> &[char] {
        &self.chars
    }
}

/// A search built from the pattern and the settings in force when it was created.
///
/// Settings and tokens are fixed at construction. The result list is filled by
/// exactly one executor run and is read-only once that run completes.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pattern: String,
    tokens: Vec<Token>,
    settings: SearchSettings,
    results: Vec<RecordId>,
}

impl SearchQuery {
    /// Builds a query. The pattern is trimmed; tokens are split on whitespace
    /// with empty and repeated tokens dropped.
    #[must_use]
    pub fn new(pattern: &str, settings: SearchSettings) -> Self {
        let pattern = pattern.trim().to_string();
        let mut tokens: Vec<Token> = Vec::new();
        for word in pattern.split_whitespace() {
            if !tokens.iter().any(|t| t.text == word) {
                tokens.push(Token::new(word));
            }
        }
        Self {
            pattern,
            tokens,
            settings,
            results: Vec::new(),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[must_use]
    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    #[must_use]
    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.settings.case_sensitivity
    }

    /// Matching records in traversal order.
    #[must_use]
    pub fn results(&self) -> &[RecordId] {
        &self.results
    }

    /// True for an empty or all-whitespace pattern. Such queries are never scanned.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.tokens.is_empty()
    }

    pub(crate) fn push_result(&mut self, id: RecordId) {
        self.results.push(id);
    }

    /// Every flag and the case mode are identical. The pattern is not compared.
    #[must_use]
    pub fn settings_eq(&self, other: &Self) -> bool {
        self.settings == other.settings
    }

    /// Same settings and same pattern: the results of one can stand in for the other.
    #[must_use]
    pub fn params_eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.settings_eq(other)
    }

    /// True if `newer` has the same settings and its pattern contains this
    /// query's pattern as a substring.
    ///
    /// This is a textual relation, not a token-set one: "ab" refines "a",
    /// but "ab" does not refine "ba" even though they tokenize alike.
    #[must_use]
    pub fn is_refined_by(&self, newer: &Self) -> bool {
        self.settings_eq(newer) && newer.pattern.contains(self.pattern.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pattern: &str) -> SearchQuery {
        SearchQuery::new(pattern, SearchSettings::default())
    }

    #[test]
    fn test_tokenization() {
        let q = query("  bank   中国 bank\tcard ");
        assert_eq!(q.pattern(), "bank   中国 bank\tcard");
        let tokens: Vec<&str> = q.tokens().iter().map(Token::as_str).collect();
        assert_eq!(tokens, ["bank", "中国", "card"]);
    }

    #[test]
    fn test_blank() {
        assert!(query("").is_blank());
        assert!(query(" \t ").is_blank());
        assert!(!query("a").is_blank());
    }

    #[test]
    fn test_params_eq_ignores_results() {
        let mut a = query("mail");
        a.push_result(RecordId::new(1));
        assert!(a.params_eq(&query("mail")));
        assert!(!a.params_eq(&query("mails")));
    }

    #[test]
    fn test_settings_eq_compares_every_flag() {
        let a = query("x");
        let mut settings = SearchSettings::default();
        settings.search_in_group_path = true;
        let b = SearchQuery::new("x", settings);
        assert!(!a.settings_eq(&b));

        let mut settings = SearchSettings::default();
        settings.case_sensitivity = CaseSensitivity::Sensitive;
        let c = SearchQuery::new("x", settings);
        assert!(!a.settings_eq(&c));
    }

    #[test]
    fn test_refinement_is_textual() {
        assert!(query("a").is_refined_by(&query("ab")));
        assert!(query("ab").is_refined_by(&query("ab")));
        assert!(query("bank").is_refined_by(&query("my bank card")));
        assert!(!query("ba").is_refined_by(&query("ab")));
        assert!(!query("ab").is_refined_by(&query("a")));
    }

    #[test]
    fn test_refinement_requires_equal_settings() {
        let mut settings = SearchSettings::default();
        settings.exclude_expired = true;
        let narrower = SearchQuery::new("ab", settings);
        assert!(!query("a").is_refined_by(&narrower));
    }
}
