//! Error types for quicksearch.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation.

use crate::types::GroupId;
use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum QuickSearchError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Record store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown group: {0}")]
    UnknownGroup(GroupId),

    #[error("Invalid store snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Search operation errors.
///
/// `Cancelled` is a control signal rather than a failure: scan-level calls
/// return it as soon as they observe a cancellation request, and the
/// controller drops it without publishing anything.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search cancelled")]
    Cancelled,

    #[error("Search controller has shut down")]
    ControllerClosed,
}

/// Failures of the underlying transliteration backend.
///
/// Never escapes the transliteration index: a failing lookup is cached as
/// "no readings" and literal matching carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransliterationError {
    #[error("Transliteration backend failed for {ch:?}: {reason}")]
    Backend { ch: char, reason: String },

    #[error("Transliteration backend panicked for {0:?}")]
    Panicked(char),
}

/// Result type alias for top-level operations.
pub type Result<T> = std::result::Result<T, QuickSearchError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

// Error code implementations for machine-readable error responses
impl QuickSearchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.code(),
            Self::Search(e) => e.code(),
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

impl StoreError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownGroup(_) => "UNKNOWN_GROUP",
            Self::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
        }
    }
}

impl SearchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ControllerClosed => "CONTROLLER_CLOSED",
        }
    }
}

impl TransliterationError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "TRANSLITERATION_BACKEND",
            Self::Panicked(_) => "TRANSLITERATION_PANIC",
        }
    }
}
