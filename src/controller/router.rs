//! Routes live input to the controller of the currently selected store.

use super::{ControllerConfig, ControllerHandle, SearchController, SearchSink};
use crate::error::SearchResult;
use crate::services::{ScanProbe, SearchExecutor, TransliterationIndex};
use crate::settings::SettingsSource;
use crate::store::RecordStore;
use crate::types::StoreId;
use std::collections::HashMap;
use std::sync::Arc;

/// One controller per open store, with input wired to the active one.
///
/// Switching the active store only changes where future input goes. The
/// other controllers keep their caches and any running scan.
pub struct SearchRouter {
    executor: SearchExecutor,
    settings: Arc<dyn SettingsSource>,
    config: ControllerConfig,
    controllers: HashMap<StoreId, ControllerHandle>,
    active: Option<StoreId>,
}

impl SearchRouter {
    /// All controllers share `index`, so readings resolved for one store are
    /// reused by every other.
    #[must_use]
    pub fn new(
        index: Arc<TransliterationIndex>,
        settings: Arc<dyn SettingsSource>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            executor: SearchExecutor::new(index),
            settings,
            config,
            controllers: HashMap::new(),
            active: None,
        }
    }

    /// Attaches scan counters to every controller opened afterwards.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<ScanProbe>) -> Self {
        self.executor = self.executor.clone().with_probe(probe);
        self
    }

    /// Opens `store` under `id` and makes it active.
    ///
    /// If `id` is already open this is a reload: the existing controller gets
    /// the new store contents and keeps its sink.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if a reload races with the
    /// existing controller stopping.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn open_store(
        &mut self,
        id: StoreId,
        store: Arc<RecordStore>,
        sink: Arc<dyn SearchSink>,
    ) -> SearchResult<ControllerHandle> {
        let existing = self
            .controllers
            .get(&id)
            .filter(|handle| !handle.is_closed())
            .cloned();
        let handle = match existing {
            Some(existing) => {
                existing.replace_store(store)?;
                existing
            }
            None => {
                tracing::info!(%id, "opening store");
                let handle = SearchController::spawn(
                    store,
                    Arc::clone(&self.settings),
                    self.executor.clone(),
                    sink,
                    self.config,
                );
                self.controllers.insert(id, handle.clone());
                handle
            }
        };
        self.active = Some(id);
        Ok(handle)
    }

    /// Shuts down the controller of `id`. Returns true when no store remains
    /// open afterwards.
    pub fn close_store(&mut self, id: StoreId) -> bool {
        if let Some(handle) = self.controllers.remove(&id) {
            tracing::info!(%id, "closing store");
            // Already stopped is fine.
            let _ = handle.shutdown();
        }
        if self.active == Some(id) {
            self.active = None;
        }
        self.controllers.is_empty()
    }

    /// Makes `id` the target of future input. Returns false if it is not open.
    pub fn select_store(&mut self, id: StoreId) -> bool {
        if self.controllers.contains_key(&id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<StoreId> {
        self.active
    }

    #[must_use]
    pub fn controller(&self, id: StoreId) -> Option<&ControllerHandle> {
        self.controllers.get(&id)
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.controllers.len()
    }

    fn active_handle(&self) -> Option<&ControllerHandle> {
        self.active.and_then(|id| self.controllers.get(&id))
    }

    /// Forwards an input change to the active store. A no-op without one.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the active controller stopped.
    pub fn input_changed(&self, text: &str) -> SearchResult<()> {
        match self.active_handle() {
            Some(handle) => handle.input_changed(text),
            None => Ok(()),
        }
    }

    /// Forwards a commit to the active store. A no-op without one.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the active controller stopped.
    pub fn commit(&self) -> SearchResult<()> {
        match self.active_handle() {
            Some(handle) => handle.commit(),
            None => Ok(()),
        }
    }

    /// The search box lost focus: every store forgets its previous searches.
    pub fn focus_lost(&self) {
        for (id, handle) in &self.controllers {
            if handle.clear_previous_searches().is_err() {
                tracing::warn!(%id, "controller already stopped");
            }
        }
    }

    /// Stops every controller.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.controllers.drain() {
            let _ = handle.shutdown();
        }
        self.active = None;
    }
}

impl Drop for SearchRouter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::NullSink;
    use crate::settings::SearchSettings;

    fn router() -> SearchRouter {
        SearchRouter::new(
            Arc::new(TransliterationIndex::pinyin()),
            Arc::new(SearchSettings::default()),
            ControllerConfig::default(),
        )
    }

    fn store() -> Arc<RecordStore> {
        Arc::new(RecordStore::new("Root"))
    }

    #[tokio::test]
    async fn test_open_select_close() {
        let mut router = router();
        let a = StoreId::new(1);
        let b = StoreId::new(2);

        router.open_store(a, store(), Arc::new(NullSink)).unwrap();
        router.open_store(b, store(), Arc::new(NullSink)).unwrap();
        assert_eq!(router.active(), Some(b));
        assert_eq!(router.open_count(), 2);

        assert!(router.select_store(a));
        assert!(!router.select_store(StoreId::new(9)));
        assert_eq!(router.active(), Some(a));

        assert!(!router.close_store(a));
        assert_eq!(router.active(), None);
        assert!(router.close_store(b));
    }

    #[tokio::test]
    async fn test_scan_counters_reach_opened_controllers() {
        let probe = Arc::new(ScanProbe::new());
        let mut router = router().with_probe(Arc::clone(&probe));
        let mut store = RecordStore::new("Root");
        store
            .add_record(store.root(), crate::store::NewRecord::new().title("Mail"))
            .unwrap();
        let handle = router
            .open_store(StoreId::new(1), Arc::new(store), Arc::new(NullSink))
            .unwrap();

        router.input_changed("mail").unwrap();
        router.commit().unwrap();
        handle.settled().await.unwrap();

        assert_eq!(probe.full_scans(), 1);
        assert_eq!(probe.records_visited(), 1);
    }

    #[tokio::test]
    async fn test_reopen_reuses_controller() {
        let mut router = router();
        let id = StoreId::new(1);
        router.open_store(id, store(), Arc::new(NullSink)).unwrap();
        router.open_store(id, store(), Arc::new(NullSink)).unwrap();
        assert_eq!(router.open_count(), 1);
    }

    #[tokio::test]
    async fn test_input_without_active_store_is_ignored() {
        let router = router();
        assert!(router.input_changed("abc").is_ok());
        assert!(router.commit().is_ok());
    }
}
