//! Live search driver for one store.
//!
//! A [`SearchController`] is an actor: it owns the cache, the debounce timer
//! and the handle to the running scan, and is driven by commands sent through
//! a [`ControllerHandle`]. Scans run on the blocking pool and report back on
//! an internal channel; the actor decides whether their outcome is still
//! wanted.
//!
//! ```text
//!                input changed
//!   Idle ─────────────────────────▶ Debouncing ◀──┐ input changed
//!    ▲                                 │   └───────┘ (timer restarts)
//!    │ scan completed                  │ timer fires / commit
//!    │ (publish + cache)               ▼
//!    └────────────────────────────── Scanning ──▶ Cancelling
//!                                        ▲          │ new scan or empty input
//!                                        └──────────┘
//! ```
//!
//! Only the scan started last may publish. A superseded scan is cancelled and
//! its outcome is discarded whenever it arrives.

mod router;
mod sink;

pub use router::SearchRouter;
pub use sink::{NullSink, SearchSink, SearchStatus};

use crate::error::{SearchError, SearchResult};
use crate::services::{CacheHit, ScanStats, SearchCache, SearchExecutor, SearchQuery};
use crate::settings::SettingsSource;
use crate::store::RecordStore;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default quiet period between the last keystroke and the scan.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Quiet period after the last input change before a scan starts.
    #[serde(with = "millis")]
    pub debounce: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Observable lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    /// Input changed recently; waiting for the quiet period to elapse.
    Debouncing,
    Scanning,
    /// A scan was cancelled and has not acknowledged it yet.
    Cancelling,
}

enum Command {
    InputChanged(String),
    Commit,
    ClearPreviousSearches,
    ReplaceStore(Arc<RecordStore>),
    Settled(oneshot::Sender<()>),
    Shutdown,
}

/// Sent by a scan thread when it stops, whether finished or cancelled.
struct Completion {
    generation: u64,
    query: SearchQuery,
    outcome: SearchResult<ScanStats>,
}

struct ActiveScan {
    generation: u64,
    cancel: CancellationToken,
}

/// Cloneable front end of a running controller.
///
/// Every method only enqueues a command, so all of them are cheap and safe to
/// call from a UI thread. They fail with [`SearchError::ControllerClosed`]
/// once the controller task has stopped.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ControllerState>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InputChanged(text) => f.debug_tuple("InputChanged").field(text).finish(),
            Self::Commit => write!(f, "Commit"),
            Self::ClearPreviousSearches => write!(f, "ClearPreviousSearches"),
            Self::ReplaceStore(_) => write!(f, "ReplaceStore"),
            Self::Settled(_) => write!(f, "Settled"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl ControllerHandle {
    fn send(&self, command: Command) -> SearchResult<()> {
        self.commands
            .send(command)
            .map_err(|_| SearchError::ControllerClosed)
    }

    /// The search text changed. Restarts the debounce timer, or resets to the
    /// unfiltered list right away when the text is blank.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the controller has stopped.
    pub fn input_changed(&self, text: impl Into<String>) -> SearchResult<()> {
        self.send(Command::InputChanged(text.into()))
    }

    /// Runs a pending search now instead of waiting out the debounce.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the controller has stopped.
    pub fn commit(&self) -> SearchResult<()> {
        self.send(Command::Commit)
    }

    /// Forgets every cached query. A running scan is left alone and will be
    /// cached when it completes.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the controller has stopped.
    pub fn clear_previous_searches(&self) -> SearchResult<()> {
        self.send(Command::ClearPreviousSearches)
    }

    /// Swaps in a reloaded store. Cancels any scan, clears the cache and
    /// re-runs the current search against the new contents.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the controller has stopped.
    pub fn replace_store(&self, store: Arc<RecordStore>) -> SearchResult<()> {
        self.send(Command::ReplaceStore(store))
    }

    /// Stops the controller, cancelling any running scan.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the controller already stopped.
    pub fn shutdown(&self) -> SearchResult<()> {
        self.send(Command::Shutdown)
    }

    /// Resolves once no search is pending or running, i.e. the outcome of the
    /// latest input has been published.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::ControllerClosed` if the controller stops first.
    pub async fn settled(&self) -> SearchResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Settled(tx))?;
        rx.await.map_err(|_| SearchError::ControllerClosed)
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ControllerState> {
        self.state.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Actor state for one store. Create with [`SearchController::spawn`].
pub struct SearchController {
    store: Arc<RecordStore>,
    settings: Arc<dyn SettingsSource>,
    executor: SearchExecutor,
    sink: Arc<dyn SearchSink>,
    config: ControllerConfig,
    cache: SearchCache,
    text: String,
    deadline: Option<Instant>,
    active: Option<ActiveScan>,
    /// Cancelled scans that have not reported back yet.
    draining: usize,
    generation: u64,
    waiters: Vec<oneshot::Sender<()>>,
    completions: mpsc::UnboundedSender<Completion>,
    state: watch::Sender<ControllerState>,
}

impl SearchController {
    /// Starts a controller task for `store` and returns its handle.
    ///
    /// The task ends on [`ControllerHandle::shutdown`] or when every handle
    /// has been dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn(
        store: Arc<RecordStore>,
        settings: Arc<dyn SettingsSource>,
        executor: SearchExecutor,
        sink: Arc<dyn SearchSink>,
        config: ControllerConfig,
    ) -> ControllerHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ControllerState::Idle);

        let controller = Self {
            store,
            settings,
            executor,
            sink,
            config,
            cache: SearchCache::new(),
            text: String::new(),
            deadline: None,
            active: None,
            draining: 0,
            generation: 0,
            waiters: Vec::new(),
            completions: completions_tx,
            state: state_tx,
        };
        tokio::spawn(controller.run(commands_rx, completions_rx));

        ControllerHandle {
            commands: commands_tx,
            state: state_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        tracing::debug!(records = self.store.record_count(), "search controller started");
        loop {
            let deadline = self.deadline;
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(done) = completions.recv() => self.finish(done),
                () = debounce_elapsed(deadline) => {
                    self.deadline = None;
                    self.trigger();
                }
            }
            self.publish_state();
            if self.active.is_none() && self.deadline.is_none() {
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }

        self.cancel_active();
        tracing::debug!("search controller stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::InputChanged(text) => {
                self.text = text;
                if self.text.trim().is_empty() {
                    self.deadline = None;
                    self.reset();
                } else {
                    self.deadline = Some(Instant::now() + self.config.debounce);
                }
            }
            Command::Commit => {
                if self.deadline.take().is_some() {
                    self.trigger();
                }
            }
            Command::ClearPreviousSearches => {
                tracing::debug!(entries = self.cache.len(), "clearing previous searches");
                self.cache.clear();
            }
            Command::ReplaceStore(store) => {
                tracing::debug!(records = store.record_count(), "store replaced");
                self.cancel_active();
                self.store = store;
                self.cache.clear();
                self.deadline = None;
                if self.text.trim().is_empty() {
                    self.reset();
                } else {
                    self.trigger();
                }
            }
            Command::Settled(waiter) => self.waiters.push(waiter),
            Command::Shutdown => {}
        }
    }

    /// Back to the unfiltered list: nothing is searched, nothing is cached.
    fn reset(&mut self) {
        self.cancel_active();
        self.cache.clear();
        self.sink.status(SearchStatus::Normal);
        self.sink.unfiltered(&self.store.all_records_breadth_first());
    }

    /// Starts a search for the current text, resolving it from the cache
    /// when possible.
    fn trigger(&mut self) {
        let query = SearchQuery::new(&self.text, self.settings.current());
        if query.is_blank() {
            self.reset();
            return;
        }

        self.cancel_active();
        self.sink.status(SearchStatus::Pending);

        let candidates = match self.cache.lookup(&query) {
            CacheHit::Exact(hit) => {
                tracing::debug!(pattern = query.pattern(), "exact cache hit");
                let results = hit.results().to_vec();
                self.publish(&results);
                return;
            }
            CacheHit::Refinement(hit) => {
                tracing::debug!(
                    pattern = query.pattern(),
                    base = hit.pattern(),
                    candidates = hit.results().len(),
                    "refining cached search"
                );
                Some(hit.results().to_vec())
            }
            CacheHit::Miss => None,
        };

        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        self.active = Some(ActiveScan {
            generation,
            cancel: cancel.clone(),
        });

        let store = Arc::clone(&self.store);
        let executor = self.executor.clone();
        let completions = self.completions.clone();
        let mut query = query;
        tokio::task::spawn_blocking(move || {
            let outcome = match candidates {
                Some(candidates) => {
                    executor.execute_candidates(&store, &candidates, &mut query, &cancel)
                }
                None => executor.execute(&store, &mut query, &cancel),
            };
            // The controller may be gone; nobody is waiting then.
            let _ = completions.send(Completion {
                generation,
                query,
                outcome,
            });
        });
    }

    fn finish(&mut self, done: Completion) {
        let current = self
            .active
            .as_ref()
            .is_some_and(|active| active.generation == done.generation);
        if !current {
            self.draining = self.draining.saturating_sub(1);
            tracing::trace!(generation = done.generation, "discarding superseded scan");
            return;
        }

        self.active = None;
        match done.outcome {
            Ok(stats) => {
                tracing::debug!(
                    pattern = done.query.pattern(),
                    matches = stats.matches,
                    "search settled"
                );
                self.publish(done.query.results());
                self.cache.push(done.query);
            }
            // Only reachable if the token was cancelled without superseding
            // the scan, which the controller never does.
            Err(e) => tracing::warn!("current scan failed: {}", e),
        }
    }

    fn publish(&self, results: &[RecordId]) {
        if results.is_empty() {
            self.sink.status(SearchStatus::Error);
        } else {
            self.sink.status(SearchStatus::Success);
            self.sink.results(results);
        }
    }

    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            self.draining += 1;
        }
    }

    fn current_state(&self) -> ControllerState {
        if self.active.is_some() {
            ControllerState::Scanning
        } else if self.deadline.is_some() {
            ControllerState::Debouncing
        } else if self.draining > 0 {
            ControllerState::Cancelling
        } else {
            ControllerState::Idle
        }
    }

    fn publish_state(&self) {
        let state = self.current_state();
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

async fn debounce_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
