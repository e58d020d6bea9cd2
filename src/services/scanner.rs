//! Single-record evaluation: do all query tokens appear somewhere in the record?

use crate::error::{SearchError, SearchResult};
use crate::services::matcher::TokenMatcher;
use crate::services::query::SearchQuery;
use crate::services::transliteration::{is_logographic, TransliterationIndex};
use crate::settings::{CaseSensitivity, SearchSettings};
use crate::store::{FieldKind, Record, RecordStore};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

/// Which query tokens have been found so far in the current record.
struct MatchSet {
    found: Vec<bool>,
    remaining: usize,
}

impl MatchSet {
    fn new(len: usize) -> Self {
        Self {
            found: vec![false; len],
            remaining: len,
        }
    }

    fn contains(&self, i: usize) -> bool {
        self.found[i]
    }

    fn insert(&mut self, i: usize) {
        if !self.found[i] {
            self.found[i] = true;
            self.remaining -= 1;
        }
    }

    fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

fn field_enabled(settings: &SearchSettings, kind: FieldKind) -> bool {
    match kind {
        FieldKind::Title => settings.search_in_title,
        FieldKind::UserName => settings.search_in_user_name,
        FieldKind::Password => settings.search_in_password,
        FieldKind::Url => settings.search_in_url,
        FieldKind::Notes => settings.search_in_notes,
        FieldKind::Other => settings.search_in_other,
    }
}

fn check(cancel: &CancellationToken) -> SearchResult<()> {
    if cancel.is_cancelled() {
        Err(SearchError::Cancelled)
    } else {
        Ok(())
    }
}

/// Applies a query's tokens across the enabled fields, tags and group path of a record.
pub struct FieldScanner<'a> {
    store: &'a RecordStore,
    matcher: TokenMatcher<'a>,
}

impl<'a> FieldScanner<'a> {
    #[must_use]
    pub fn new(store: &'a RecordStore, index: &'a TransliterationIndex) -> Self {
        Self {
            store,
            matcher: TokenMatcher::new(index),
        }
    }

    /// Returns true if every token of `query` is found in at least one enabled
    /// field, tag or the group path of `record`.
    ///
    /// Expired records are rejected up front when the query excludes them.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Cancelled` as soon as `cancel` is observed.
    pub fn record_matches(
        &self,
        record: &Record,
        query: &SearchQuery,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> SearchResult<bool> {
        let settings = query.settings();
        if query.is_blank() || (settings.exclude_expired && record.is_expired_at(now)) {
            return Ok(false);
        }

        let mut found = MatchSet::new(query.tokens().len());

        for (name, value) in record.fields() {
            check(cancel)?;
            if field_enabled(settings, FieldKind::of(name))
                && self.add_matching_tokens(value, query, &mut found, cancel)?
            {
                break;
            }
        }

        if settings.search_in_tags && !found.is_complete() {
            for tag in record.tags() {
                check(cancel)?;
                if self.add_matching_tokens(tag, query, &mut found, cancel)? {
                    break;
                }
            }
        }

        let by_group = settings.search_in_group_name || settings.search_in_group_path;
        if by_group && !found.is_complete() {
            let path = self
                .store
                .group_path(record.parent(), settings.search_in_group_path);
            self.add_matching_tokens(&path, query, &mut found, cancel)?;
        }

        Ok(found.is_complete())
    }

    /// Marks the tokens found in `value`. Returns true once every token is found.
    ///
    /// Each still-missing token is tried as a substring first; only when that
    /// fails, and the value holds logographic characters, is the phonetic
    /// matcher tried from every offset.
    fn add_matching_tokens(
        &self,
        value: &str,
        query: &SearchQuery,
        found: &mut MatchSet,
        cancel: &CancellationToken,
    ) -> SearchResult<bool> {
        if value.trim().is_empty() {
            return Ok(found.is_complete());
        }

        let sensitivity = query.case_sensitivity();
        let folded = match sensitivity {
            CaseSensitivity::Insensitive => Some(value.to_lowercase()),
            CaseSensitivity::Sensitive => None,
        };
        let phonetic = value.chars().any(is_logographic);
        let mut chars: Option<Vec<char>> = None;

        for (i, token) in query.tokens().iter().enumerate() {
            check(cancel)?;
            if found.contains(i) {
                continue;
            }

            let literal = match &folded {
                Some(folded) => folded.contains(token.folded()),
                None => value.contains(token.as_str()),
            };
            if literal {
                found.insert(i);
                continue;
            }

            if phonetic {
                let text = chars.get_or_insert_with(|| value.chars().collect());
                if self.matcher.with_case(sensitivity).contains(text, token.chars()) {
                    found.insert(i);
                }
            }
        }

        Ok(found.is_complete())
    }
}
