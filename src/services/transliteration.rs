//! Per-character pinyin reading cache.
//!
//! Looking up a character's readings in the conversion library is slow
//! compared to the scan loop, and the same few thousand characters repeat
//! across every record. The index asks the backend at most once per
//! character (modulo a benign race on the very first lookup) and keeps the
//! normalized answer for the lifetime of the index.

use crate::error::TransliterationError;
use ahash::AHashMap;
use pinyin::ToPinyinMulti;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Normalized readings of one character: lowercase, tone marker stripped,
/// `ü` spelled `v`, deduplicated, in backend order.
pub type Readings = Arc<[String]>;

/// First and last code point treated as a logographic (CJK unified) character.
const LOGOGRAPHIC_RANGE: std::ops::RangeInclusive<char> = '\u{4E00}'..='\u{9FA5}';

/// Character used to force the backend's lazy initialization during warm-up.
const WARM_UP_CHAR: char = '一';

/// Returns true if `ch` is in the range the phonetic matcher handles.
#[must_use]
pub fn is_logographic(ch: char) -> bool {
    LOGOGRAPHIC_RANGE.contains(&ch)
}

/// Source of raw romanized readings for a single character.
///
/// Readings may carry a trailing tone number (`"zhong1"`) and any case;
/// the index normalizes them.
pub trait Transliterator: Send + Sync {
    /// Returns every reading of `ch`. An empty list means "no reading".
    ///
    /// # Errors
    ///
    /// Returns `TransliterationError::Backend` if the backend cannot convert `ch`.
    fn readings(&self, ch: char) -> Result<Vec<String>, TransliterationError>;
}

/// Transliterator backed by the `pinyin` crate's heteronym tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct PinyinTransliterator;

impl Transliterator for PinyinTransliterator {
    fn readings(&self, ch: char) -> Result<Vec<String>, TransliterationError> {
        Ok(ch
            .to_pinyin_multi()
            .map(|multi| {
                multi
                    .into_iter()
                    .map(|p| p.with_tone_num_end().to_string())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Thread-safe, append-only cache of character readings.
///
/// The lock is only held to read or insert a single entry, never across a
/// backend call, so concurrent scans only contend while publishing one
/// character.
pub struct TransliterationIndex {
    backend: Arc<dyn Transliterator>,
    cache: RwLock<AHashMap<char, Option<Readings>>>,
    backend_calls: AtomicUsize,
}

impl TransliterationIndex {
    /// Creates an empty index over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn Transliterator>) -> Self {
        Self {
            backend,
            cache: RwLock::new(AHashMap::new()),
            backend_calls: AtomicUsize::new(0),
        }
    }

    /// Creates an index backed by [`PinyinTransliterator`].
    #[must_use]
    pub fn pinyin() -> Self {
        Self::new(Arc::new(PinyinTransliterator))
    }

    /// Returns the normalized readings of `ch`, or `None` if it has none.
    ///
    /// Characters outside the logographic range resolve to `None` without
    /// consulting the backend. Backend failures (errors or panics) are
    /// cached as `None` as well.
    pub fn readings(&self, ch: char) -> Option<Readings> {
        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&ch)
        {
            return cached.clone();
        }

        let computed = if is_logographic(ch) {
            self.lookup_backend(ch)
        } else {
            None
        };

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(ch)
            .or_insert(computed)
            .clone()
    }

    fn lookup_backend(&self, ch: char) -> Option<Readings> {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.backend.readings(ch)))
            .unwrap_or(Err(TransliterationError::Panicked(ch)));

        match outcome {
            Ok(raw) => normalize(raw),
            Err(e) => {
                tracing::warn!("{e}; falling back to literal matching");
                None
            }
        }
    }

    /// Number of times the backend has been consulted.
    #[must_use]
    pub fn backend_calls(&self) -> usize {
        self.backend_calls.load(Ordering::Relaxed)
    }

    /// Number of cached characters (including negative entries).
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pays the backend's initialization cost off the caller's thread.
    ///
    /// Fire-and-forget: runs on tokio's blocking pool when called inside a
    /// runtime, on a plain thread otherwise. Failures are ignored.
    pub fn warm_up(self: &Arc<Self>) {
        let index = Arc::clone(self);
        let job = move || {
            let _ = index.readings(WARM_UP_CHAR);
            tracing::debug!("transliteration index warmed up");
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => {
                let _ = std::thread::Builder::new()
                    .name("transliteration-warm-up".to_string())
                    .spawn(job);
            }
        }
    }
}

impl std::fmt::Debug for TransliterationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransliterationIndex")
            .field("cached", &self.len())
            .field("backend_calls", &self.backend_calls())
            .finish()
    }
}

/// Strips trailing tone numbers, folds case, spells `ü` as `v` (the keyboard
/// convention, "lv" for 绿) and dedups. Empty results become `None`.
fn normalize(raw: Vec<String>) -> Option<Readings> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for reading in raw {
        let clean = reading
            .trim_end_matches(|c: char| c.is_ascii_digit())
            .to_lowercase()
            .replace('ü', "v");
        if !clean.is_empty() && !out.contains(&clean) {
            out.push(clean);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out.into())
    }
}
