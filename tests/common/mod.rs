//! Common test utilities for quicksearch integration tests.
//!
//! Provides a deterministic transliteration backend, a sink that records
//! everything a controller publishes, and a small sample store.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use chrono::{Duration, Utc};
use quicksearch::controller::{SearchSink, SearchStatus};
use quicksearch::error::TransliterationError;
use quicksearch::services::{SearchExecutor, SearchQuery, TransliterationIndex, Transliterator};
use quicksearch::settings::SearchSettings;
use quicksearch::store::{NewRecord, RecordStore, SearchEnabled};
use quicksearch::types::RecordId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fixed reading table so tests do not depend on the pinyin dictionary.
pub struct FakeTransliterator {
    table: HashMap<char, Vec<String>>,
}

impl FakeTransliterator {
    pub fn new() -> Self {
        let entries: &[(char, &[&str])] = &[
            ('中', &["zhong1", "zhong4"]),
            ('国', &["guo2"]),
            ('银', &["yin2"]),
            ('行', &["hang2", "xing2"]),
            ('招', &["zhao1"]),
            ('商', &["shang1"]),
            ('邮', &["you2"]),
            ('箱', &["xiang1"]),
        ];
        let table = entries
            .iter()
            .map(|(ch, readings)| (*ch, readings.iter().map(|r| (*r).to_string()).collect()))
            .collect();
        Self { table }
    }
}

impl Transliterator for FakeTransliterator {
    fn readings(&self, ch: char) -> Result<Vec<String>, TransliterationError> {
        Ok(self.table.get(&ch).cloned().unwrap_or_default())
    }
}

pub fn fake_index() -> Arc<TransliterationIndex> {
    Arc::new(TransliterationIndex::new(Arc::new(FakeTransliterator::new())))
}

/// One published item, in publication order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Status(SearchStatus),
    Results(Vec<RecordId>),
    Unfiltered(Vec<RecordId>),
}

/// Sink that forwards everything to a channel the test reads from.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<Published>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, Recording) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), Recording { rx })
    }
}

impl SearchSink for RecordingSink {
    fn status(&self, status: SearchStatus) {
        let _ = self.tx.send(Published::Status(status));
    }

    fn results(&self, records: &[RecordId]) {
        let _ = self.tx.send(Published::Results(records.to_vec()));
    }

    fn unfiltered(&self, records: &[RecordId]) {
        let _ = self.tx.send(Published::Unfiltered(records.to_vec()));
    }
}

/// Receiving end of a [`RecordingSink`].
pub struct Recording {
    rx: mpsc::UnboundedReceiver<Published>,
}

impl Recording {
    /// Everything published since the last call.
    pub fn drain(&mut self) -> Vec<Published> {
        let mut out = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            out.push(item);
        }
        out
    }

    pub fn statuses(&mut self) -> Vec<SearchStatus> {
        self.drain()
            .into_iter()
            .filter_map(|p| match p {
                Published::Status(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

/// Sample store:
///
/// ```text
/// Root
/// ├── Mail                  url mail.example.com, user alice
/// ├── 邮箱                  notes "personal mailbox"
/// ├── Finance
/// │   ├── Tax Portal        expired yesterday
/// │   └── Banks
/// │       ├── 中国银行      user liwei, tag savings
/// │       └── 招商银行      user ZhangSan
/// └── Recycle Bin           searching disabled
///     └── Old Mail
/// ```
pub struct SampleStore {
    pub store: RecordStore,
    pub mail: RecordId,
    pub mailbox: RecordId,
    pub tax: RecordId,
    pub boc: RecordId,
    pub cmb: RecordId,
    pub old_mail: RecordId,
}

pub fn sample_store() -> SampleStore {
    let mut store = RecordStore::new("Root");
    let root = store.root();

    let mail = store
        .add_record(
            root,
            NewRecord::new()
                .title("Mail")
                .url("https://mail.example.com")
                .user_name("alice"),
        )
        .unwrap();
    let mailbox = store
        .add_record(root, NewRecord::new().title("邮箱").notes("personal mailbox"))
        .unwrap();

    let finance = store.add_group(root, "Finance").unwrap();
    let tax = store
        .add_record(
            finance,
            NewRecord::new()
                .title("Tax Portal")
                .expires_at(Utc::now() - Duration::days(1)),
        )
        .unwrap();
    let banks = store.add_group(finance, "Banks").unwrap();
    let boc = store
        .add_record(
            banks,
            NewRecord::new().title("中国银行").user_name("liwei").tag("savings"),
        )
        .unwrap();
    let cmb = store
        .add_record(banks, NewRecord::new().title("招商银行").user_name("ZhangSan"))
        .unwrap();

    let bin = store.add_group(root, "Recycle Bin").unwrap();
    store.set_search_enabled(bin, SearchEnabled::Disabled).unwrap();
    let old_mail = store.add_record(bin, NewRecord::new().title("Old Mail")).unwrap();

    SampleStore {
        store,
        mail,
        mailbox,
        tax,
        boc,
        cmb,
        old_mail,
    }
}

/// Runs a full, uncancelled scan and returns the matches.
pub fn search(
    executor: &SearchExecutor,
    store: &RecordStore,
    pattern: &str,
    settings: SearchSettings,
) -> Vec<RecordId> {
    let mut query = SearchQuery::new(pattern, settings);
    executor
        .execute(store, &mut query, &CancellationToken::new())
        .expect("uncancelled scan should complete");
    query.results().to_vec()
}
