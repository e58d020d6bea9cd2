//! Previously completed queries of one store, newest last.

use crate::services::query::SearchQuery;

/// How a new query relates to the cache.
#[derive(Debug)]
pub enum CacheHit<'a> {
    /// Same pattern and settings: reuse the results as they are.
    Exact(&'a SearchQuery),
    /// Same settings and the new pattern contains the cached one: only the
    /// cached results need to be scanned.
    Refinement(&'a SearchQuery),
    Miss,
}

/// Ordered list of completed queries.
///
/// Only the owning controller touches it, from its own task, so there is no
/// locking. Entries are only ever appended or cleared wholesale.
#[derive(Debug, Default)]
pub struct SearchCache {
    entries: Vec<SearchQuery>,
}

impl SearchCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the best reuse for `candidate`.
    ///
    /// Exact hits take priority over refinements; within each kind the most
    /// recent entry wins.
    #[must_use]
    pub fn lookup(&self, candidate: &SearchQuery) -> CacheHit<'_> {
        if let Some(hit) = self.entries.iter().rev().find(|q| q.params_eq(candidate)) {
            return CacheHit::Exact(hit);
        }
        if let Some(hit) = self
            .entries
            .iter()
            .rev()
            .find(|q| q.is_refined_by(candidate))
        {
            return CacheHit::Refinement(hit);
        }
        CacheHit::Miss
    }

    /// Appends a query whose scan ran to completion.
    pub fn push(&mut self, query: SearchQuery) {
        self.entries.push(query);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SearchSettings;
    use crate::types::RecordId;

    fn completed(pattern: &str, results: &[u32]) -> SearchQuery {
        let mut q = SearchQuery::new(pattern, SearchSettings::default());
        for &id in results {
            q.push_result(RecordId::new(id));
        }
        q
    }

    fn candidate(pattern: &str) -> SearchQuery {
        SearchQuery::new(pattern, SearchSettings::default())
    }

    #[test]
    fn test_miss_on_empty_cache() {
        let cache = SearchCache::new();
        assert!(matches!(cache.lookup(&candidate("a")), CacheHit::Miss));
    }

    #[test]
    fn test_exact_beats_newer_refinement() {
        let mut cache = SearchCache::new();
        cache.push(completed("ab", &[1]));
        cache.push(completed("a", &[1, 2]));

        match cache.lookup(&candidate("ab")) {
            CacheHit::Exact(q) => assert_eq!(q.results(), [RecordId::new(1)]),
            other => panic!("expected exact hit, got {other:?}"),
        }
    }

    #[test]
    fn test_most_recent_refinement_wins() {
        let mut cache = SearchCache::new();
        cache.push(completed("a", &[1, 2, 3]));
        cache.push(completed("ab", &[2, 3]));

        match cache.lookup(&candidate("abc")) {
            CacheHit::Refinement(q) => assert_eq!(q.pattern(), "ab"),
            other => panic!("expected refinement, got {other:?}"),
        }
    }

    #[test]
    fn test_anagram_is_not_a_refinement() {
        let mut cache = SearchCache::new();
        cache.push(completed("ba", &[1]));
        assert!(matches!(cache.lookup(&candidate("ab")), CacheHit::Miss));
    }

    #[test]
    fn test_clear() {
        let mut cache = SearchCache::new();
        cache.push(completed("a", &[]));
        cache.clear();
        assert!(cache.is_empty());
        assert!(matches!(cache.lookup(&candidate("a")), CacheHit::Miss));
    }
}
