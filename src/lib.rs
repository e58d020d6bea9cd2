//! quicksearch: live, cancellable fuzzy search over a hierarchical record store.
//!
//! Every keystroke in a search box becomes a debounced, cancellable scan of
//! the records of the current store. Each whitespace-separated token must be
//! found in some enabled field, tag or group path of a record, either as a
//! plain substring or, for Chinese text, through its pinyin readings
//! ("zgyh" and "zhongguoyinhang" both find "中国银行").
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                SearchRouter                 │
//! │   one controller per open store, input to   │
//! │             the active one                  │
//! └─────────────────┬───────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────┐
//! │            SearchController (actor)         │
//! │  debounce · SearchCache · cancel + publish  │
//! └─────────────────┬───────────────────────────┘
//!                   │ spawn_blocking
//! ┌─────────────────▼───────────────────────────┐
//! │              SearchExecutor                 │
//! │  full walk or refinement over prior results │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!    ┌──────────────▼──────────┐
//!    │      FieldScanner       │
//!    │ substring │ TokenMatcher│
//!    └──────────────┬──────────┘
//!                   │
//!    ┌──────────────▼──────────────┐
//!    │  TransliterationIndex       │
//!    │  shared, lazily populated   │
//!    └─────────────────────────────┘
//! ```

pub mod controller;
pub mod error;
pub mod services;
pub mod settings;
pub mod store;
pub mod types;

pub use controller::{
    ControllerConfig, ControllerHandle, ControllerState, SearchController, SearchRouter,
    SearchSink, SearchStatus,
};
pub use error::{QuickSearchError, Result, SearchError, StoreError, TransliterationError};
pub use services::{SearchExecutor, SearchQuery, TransliterationIndex};
pub use settings::{CaseSensitivity, SearchSettings, SettingsSource, SharedSettings};
pub use store::{NewRecord, RecordStore};
pub use types::{GroupId, RecordId, StoreId};
