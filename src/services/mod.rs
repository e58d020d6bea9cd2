//! Core search services: reading index, matcher, scanner, executor and cache.

mod cache;
mod executor;
pub mod matcher;
mod query;
mod scanner;
pub mod transliteration;

pub use cache::{CacheHit, SearchCache};
pub use executor::{ScanProbe, ScanScope, ScanStats, SearchExecutor};
pub use matcher::TokenMatcher;
pub use query::{SearchQuery, Token};
pub use scanner::FieldScanner;
pub use transliteration::{PinyinTransliterator, Readings, TransliterationIndex, Transliterator};
