//! Concurrent access tests for thread safety verification.
//!
//! Scans of different stores share one transliteration index; these tests
//! hammer it from several threads and check nobody sees a torn entry.

mod common;

use common::{fake_index, sample_store, search, RecordingSink};
use quicksearch::controller::{ControllerConfig, SearchController};
use quicksearch::services::{ScanProbe, SearchExecutor, TransliterationIndex};
use quicksearch::settings::SearchSettings;
use std::sync::Arc;
use std::thread;

// ============================================================================
// Shared Index Tests
// ============================================================================

#[test]
fn test_concurrent_reading_lookups() {
    let index = fake_index();
    let chars = ['中', '国', '银', '行', '招', '商', '邮', '箱', 'a', '丁'];

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for j in 0..200 {
                    let ch = chars[(i + j) % chars.len()];
                    let readings = index.readings(ch);
                    match ch {
                        '行' => {
                            let readings = readings.expect("行 has readings");
                            assert_eq!(&readings[..], ["hang", "xing"]);
                        }
                        'a' | '丁' => assert!(readings.is_none()),
                        // 中 has two tones of one syllable, collapsed to one.
                        _ => assert_eq!(readings.map(|r| r.len()), Some(1)),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    assert_eq!(index.len(), chars.len());
    // Each character is resolved at least once; racing threads may both ask
    // the backend, but never more often than there are threads.
    let logographic = chars.iter().filter(|c| !c.is_ascii()).count();
    assert!(index.backend_calls() >= logographic);
    assert!(index.backend_calls() <= logographic * 8);
}

#[test]
fn test_concurrent_scans_share_one_index() {
    let index = fake_index();
    let sample = Arc::new(sample_store());
    let expected = {
        let exec = SearchExecutor::new(Arc::new(TransliterationIndex::new(Arc::new(
            common::FakeTransliterator::new(),
        ))));
        search(&exec, &sample.store, "yh", SearchSettings::default())
    };
    assert_eq!(expected, [sample.boc, sample.cmb]);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let index = Arc::clone(&index);
            let sample = Arc::clone(&sample);
            let expected = expected.clone();
            thread::spawn(move || {
                let exec = SearchExecutor::new(index);
                for _ in 0..20 {
                    let results = search(&exec, &sample.store, "yh", SearchSettings::default());
                    assert_eq!(results, expected);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }
}

// ============================================================================
// Independent Controllers
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_controllers_run_independently() {
    let index = fake_index();
    let probe = Arc::new(ScanProbe::new());

    let mut controllers = Vec::new();
    for _ in 0..4 {
        let sample = sample_store();
        let expected = vec![sample.boc, sample.cmb];
        let (sink, recording) = RecordingSink::new();
        let handle = SearchController::spawn(
            Arc::new(sample.store),
            Arc::new(SearchSettings::default()),
            SearchExecutor::new(Arc::clone(&index)).with_probe(Arc::clone(&probe)),
            sink,
            ControllerConfig::default(),
        );
        controllers.push((handle, recording, expected));
    }

    for (handle, _, _) in &controllers {
        handle.input_changed("yinhang").unwrap();
        handle.commit().unwrap();
    }
    for (handle, recording, expected) in &mut controllers {
        handle.settled().await.unwrap();
        assert_eq!(
            recording.drain().last(),
            Some(&common::Published::Results(expected.clone()))
        );
    }

    assert_eq!(probe.full_scans(), 4);
    assert_eq!(probe.cancelled_scans(), 0);
}
