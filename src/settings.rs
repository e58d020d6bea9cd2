//! Search settings and the collaborator that supplies them.
//!
//! Settings are read once per query. A UI that changes them while a scan is
//! running only affects the next query.

use crate::error::QuickSearchError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::RwLock;

/// How the substring fast path compares text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    Sensitive,
    #[default]
    Insensitive,
}

/// Field selection and filtering flags for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub search_in_title: bool,
    pub search_in_url: bool,
    pub search_in_user_name: bool,
    pub search_in_notes: bool,
    pub search_in_password: bool,
    pub search_in_tags: bool,
    pub search_in_group_name: bool,
    pub search_in_group_path: bool,
    /// Custom (non-standard) fields.
    pub search_in_other: bool,
    pub case_sensitivity: CaseSensitivity,
    pub exclude_expired: bool,
    pub ignore_group_settings: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_in_title: true,
            search_in_url: true,
            search_in_user_name: true,
            search_in_notes: true,
            search_in_password: false,
            search_in_tags: true,
            search_in_group_name: false,
            search_in_group_path: false,
            search_in_other: true,
            case_sensitivity: CaseSensitivity::Insensitive,
            exclude_expired: false,
            ignore_group_settings: false,
        }
    }
}

impl SearchSettings {
    /// Reads settings from a JSON file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `QuickSearchError::Io` or `QuickSearchError::Json`.
    pub fn load_json(path: &Path) -> Result<Self, QuickSearchError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Supplies the current settings whenever a query is built.
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> SearchSettings;
}

impl SettingsSource for SearchSettings {
    fn current(&self) -> SearchSettings {
        *self
    }
}

/// Settings that can be changed at runtime from any thread.
#[derive(Debug, Default)]
pub struct SharedSettings {
    inner: RwLock<SearchSettings>,
}

impl SharedSettings {
    #[must_use]
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Applies `f` to the stored settings.
    pub fn update(&self, f: impl FnOnce(&mut SearchSettings)) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard);
    }
}

impl SettingsSource for SharedSettings {
    fn current(&self) -> SearchSettings {
        *self
            .inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
