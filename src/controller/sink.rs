//! Output side of a controller: where status and results are published.

use crate::types::RecordId;
use serde::Serialize;
use std::fmt;

/// Search box status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    /// No search active; the unfiltered list is shown.
    Normal,
    /// A search has been triggered and has not settled yet.
    Pending,
    /// The last search matched at least one record.
    Success,
    /// The last search matched nothing.
    Error,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Receives everything a controller publishes.
///
/// Always called from the controller's own task, never from a scan thread,
/// and only for the most recent search. Implementations should hand the data
/// off quickly (e.g. into a channel to the UI thread).
pub trait SearchSink: Send + Sync + 'static {
    fn status(&self, status: SearchStatus);

    /// Matching records of a settled, non-empty search, in traversal order.
    fn results(&self, records: &[RecordId]);

    /// The full record list, shown when the search box is emptied.
    fn unfiltered(&self, records: &[RecordId]);
}

/// Sink that drops everything. Useful when only the cache side effects matter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SearchSink for NullSink {
    fn status(&self, _status: SearchStatus) {}
    fn results(&self, _records: &[RecordId]) {}
    fn unfiltered(&self, _records: &[RecordId]) {}
}
