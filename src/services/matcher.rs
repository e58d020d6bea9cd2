//! Literal-or-phonetic token matching.
//!
//! A token matches at a text position if it can be consumed by walking the
//! text, where each text character either equals the next token character
//! or, for a logographic character, one of its readings shares a non-empty
//! prefix with the rest of the token. Literal characters compare under the
//! matcher's `CaseSensitivity`; readings always compare case-insensitively. One character always
//! consumes exactly one syllable prefix, so "zg", "zhongg" and "zhongguo" all
//! match "中国".
//!
//! Readings are ambiguous (`行` is both "hang" and "xing"), so every
//! alternative is explored. The search runs on an explicit stack and never
//! revisits a `(text, token)` position pair, which bounds the work by
//! `text.len() * token.len()` regardless of input.

use crate::services::transliteration::{is_logographic, TransliterationIndex};
use crate::settings::CaseSensitivity;
use ahash::AHashSet;

/// Case-insensitive character equality.
#[must_use]
pub fn chars_eq(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Length of the longest case-insensitive common prefix of `reading` and `rest`.
#[must_use]
pub fn common_prefix_len(reading: &str, rest: &[char]) -> usize {
    reading
        .chars()
        .zip(rest)
        .take_while(|(r, t)| chars_eq(*r, **t))
        .count()
}

/// Matches tokens against text using an injected reading index.
#[derive(Clone, Copy)]
pub struct TokenMatcher<'a> {
    index: &'a TransliterationIndex,
    case: CaseSensitivity,
}

impl<'a> TokenMatcher<'a> {
    /// A case-insensitive matcher.
    #[must_use]
    pub fn new(index: &'a TransliterationIndex) -> Self {
        Self {
            index,
            case: CaseSensitivity::Insensitive,
        }
    }

    /// Same index, with literal characters compared under `case`.
    #[must_use]
    pub fn with_case(self, case: CaseSensitivity) -> Self {
        Self { case, ..self }
    }

    fn literal_eq(&self, a: char, b: char) -> bool {
        match self.case {
            CaseSensitivity::Sensitive => a == b,
            CaseSensitivity::Insensitive => chars_eq(a, b),
        }
    }

    /// Returns true if `token` matches `text` starting at `start`.
    #[must_use]
    pub fn token_matches_at(&self, text: &[char], start: usize, token: &[char]) -> bool {
        let mut seen = AHashSet::new();
        self.walk(text, start, token, &mut seen)
    }

    /// Returns true if `token` matches at any start offset of `text`.
    #[must_use]
    pub fn contains(&self, text: &[char], token: &[char]) -> bool {
        if token.is_empty() {
            return false;
        }
        // A failed (text, token) state fails from every start, so the
        // visited set is shared across start offsets.
        let mut seen = AHashSet::new();
        (0..text.len()).any(|start| self.walk(text, start, token, &mut seen))
    }

    fn walk(
        &self,
        text: &[char],
        start: usize,
        token: &[char],
        seen: &mut AHashSet<(usize, usize)>,
    ) -> bool {
        let mut stack = vec![(start, 0usize)];

        while let Some((t, p)) = stack.pop() {
            if p >= token.len() {
                return true;
            }
            if t >= text.len() || !seen.insert((t, p)) {
                continue;
            }

            let ch = text[t];

            // Pushed first so the literal step is explored first.
            if is_logographic(ch) {
                if let Some(readings) = self.index.readings(ch) {
                    for reading in readings.iter().rev() {
                        let advance = common_prefix_len(reading, &token[p..]);
                        if advance > 0 {
                            stack.push((t + 1, p + advance));
                        }
                    }
                }
            }

            if self.literal_eq(ch, token[p]) {
                stack.push((t + 1, p + 1));
            }
        }

        false
    }
}
