//! Store traversal for one query.
//!
//! Two entry points: a full walk from the root group that honours group
//! search settings, and a walk over a flat candidate list (the results of an
//! earlier query this one refines). Both poll the cancellation token before
//! every record and every child group, and return `SearchError::Cancelled`
//! with whatever results were collected so far left in the query.

use crate::error::{SearchError, SearchResult};
use crate::services::query::SearchQuery;
use crate::services::scanner::FieldScanner;
use crate::services::transliteration::TransliterationIndex;
use crate::store::RecordStore;
use crate::types::{GroupId, RecordId};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Counters describing executor activity.
///
/// Shared between the executor and whoever wants to observe it (tests,
/// diagnostics). Relaxed ordering: values are only read after the scans
/// they describe have been joined.
#[derive(Debug, Default)]
pub struct ScanProbe {
    records_visited: AtomicUsize,
    full_scans: AtomicUsize,
    refined_scans: AtomicUsize,
    cancelled_scans: AtomicUsize,
}

impl ScanProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records handed to the field scanner, across all scans.
    #[must_use]
    pub fn records_visited(&self) -> usize {
        self.records_visited.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn full_scans(&self) -> usize {
        self.full_scans.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn refined_scans(&self) -> usize {
        self.refined_scans.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cancelled_scans(&self) -> usize {
        self.cancelled_scans.load(Ordering::Relaxed)
    }
}

/// Whether a scan covered the whole store or a previous result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    Full,
    Refined,
}

/// Summary of a completed scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanStats {
    pub scope: ScanScope,
    pub records_visited: usize,
    pub matches: usize,
    pub elapsed: Duration,
}

/// Per-run state threaded through the traversal.
struct Run<'a> {
    store: &'a RecordStore,
    scanner: FieldScanner<'a>,
    cancel: &'a CancellationToken,
    now: DateTime<Utc>,
    visited: usize,
}

/// Runs queries against a record store.
#[derive(Clone)]
pub struct SearchExecutor {
    index: Arc<TransliterationIndex>,
    probe: Option<Arc<ScanProbe>>,
}

impl SearchExecutor {
    #[must_use]
    pub fn new(index: Arc<TransliterationIndex>) -> Self {
        Self { index, probe: None }
    }

    /// Attaches counters that every subsequent scan updates.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<ScanProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<TransliterationIndex> {
        &self.index
    }

    /// Scans the whole store from its root group.
    ///
    /// Subtrees whose effective search setting is disabled are skipped unless
    /// the query ignores group settings.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Cancelled` if `cancel` fires before the walk ends.
    pub fn execute(
        &self,
        store: &RecordStore,
        query: &mut SearchQuery,
        cancel: &CancellationToken,
    ) -> SearchResult<ScanStats> {
        self.run(store, query, cancel, ScanScope::Full, |run, query| {
            run.search_group(store.root(), true, query)
        })
    }

    /// Scans only `candidates`, in order. Group settings are not consulted:
    /// they were applied when the candidate list was produced.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Cancelled` if `cancel` fires before the walk ends.
    pub fn execute_candidates(
        &self,
        store: &RecordStore,
        candidates: &[RecordId],
        query: &mut SearchQuery,
        cancel: &CancellationToken,
    ) -> SearchResult<ScanStats> {
        self.run(store, query, cancel, ScanScope::Refined, |run, query| {
            run.search_list(candidates, query)
        })
    }

    fn run<F>(
        &self,
        store: &RecordStore,
        query: &mut SearchQuery,
        cancel: &CancellationToken,
        scope: ScanScope,
        walk: F,
    ) -> SearchResult<ScanStats>
    where
        F: FnOnce(&mut Run<'_>, &mut SearchQuery) -> SearchResult<()>,
    {
        let start = Instant::now();
        let mut run = Run {
            store,
            scanner: FieldScanner::new(store, &self.index),
            cancel,
            now: Utc::now(),
            visited: 0,
        };

        let outcome = walk(&mut run, &mut *query);

        if let Some(probe) = &self.probe {
            probe
                .records_visited
                .fetch_add(run.visited, Ordering::Relaxed);
            let counter = match (&outcome, scope) {
                (Err(_), _) => &probe.cancelled_scans,
                (Ok(()), ScanScope::Full) => &probe.full_scans,
                (Ok(()), ScanScope::Refined) => &probe.refined_scans,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let elapsed = start.elapsed();
        match outcome {
            Ok(()) => {
                tracing::debug!(
                    pattern = query.pattern(),
                    ?scope,
                    visited = run.visited,
                    matches = query.results().len(),
                    "scan finished in {:?}",
                    elapsed
                );
                Ok(ScanStats {
                    scope,
                    records_visited: run.visited,
                    matches: query.results().len(),
                    elapsed,
                })
            }
            Err(e) => {
                tracing::debug!(
                    pattern = query.pattern(),
                    ?scope,
                    visited = run.visited,
                    "scan cancelled after {:?}",
                    elapsed
                );
                Err(e)
            }
        }
    }
}

impl Run<'_> {
    fn check(&self) -> SearchResult<()> {
        if self.cancel.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// `parent_enabled` is the effective setting inherited from the parent.
    fn search_group(
        &mut self,
        id: GroupId,
        parent_enabled: bool,
        query: &mut SearchQuery,
    ) -> SearchResult<()> {
        let store = self.store;
        let Some(group) = store.group(id) else {
            return Ok(());
        };
        let enabled = group.search_enabled().resolve(parent_enabled);
        if !enabled && !query.settings().ignore_group_settings {
            return Ok(());
        }

        self.search_list(group.records(), query)?;
        for &child in group.groups() {
            self.check()?;
            self.search_group(child, enabled, query)?;
        }
        Ok(())
    }

    fn search_list(&mut self, ids: &[RecordId], query: &mut SearchQuery) -> SearchResult<()> {
        let store = self.store;
        for &id in ids {
            self.check()?;
            let Some(record) = store.record(id) else {
                continue;
            };
            self.visited += 1;
            if self
                .scanner
                .record_matches(record, query, self.now, self.cancel)?
            {
                query.push_result(id);
            }
        }
        Ok(())
    }
}
