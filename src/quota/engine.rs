//! The in-memory quota engine.
//!
//! All mutable state lives behind one mutex: the non-expiring cells, the
//! rolling windows, and both deduplication generations. Every operation and
//! the background reclamation task hold it for their whole critical section,
//! which keeps capacity checks and the generation swap atomic with respect to
//! concurrent callers.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::backend::QuotaBackend;
use super::cell::CellStore;
use super::dedup::DedupCache;
use super::definition::{Labels, QuotaDefinition, QuotaRequest};
use super::key::make_key;
use super::tick::{SystemTicks, TickSource};
use super::window::{window_ticks, RollingWindow};
use crate::config::MemQuotaConfig;
use crate::error::{QuotaError, Result};

/// The kind of quota operation being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Alloc { best_effort: bool },
    Release,
}

/// State guarded by the engine lock.
#[derive(Debug, Default)]
struct QuotaState {
    /// Counters for non-expiring quotas
    cells: CellStore,
    /// Rolling windows for expiring quotas
    windows: HashMap<String, RollingWindow>,
    /// Results of recent operations by deduplication id
    dedup: DedupCache,
}

impl QuotaState {
    fn alloc(
        &mut self,
        definition: &QuotaDefinition,
        key: String,
        amount: i64,
        best_effort: bool,
        ticks: &dyn TickSource,
    ) -> i64 {
        // we optimize storage for non-expiring quotas
        if !definition.is_expiring() {
            return self
                .cells
                .alloc(&key, definition.max_amount, amount, best_effort);
        }

        let tick = ticks.now_ticks();
        match self.windows.entry(key) {
            Entry::Occupied(mut entry) => {
                let granted = entry.get_mut().alloc(amount, tick, best_effort);
                if entry.get_mut().in_use(tick) == 0 {
                    entry.remove();
                }
                granted
            }
            Entry::Vacant(entry) => {
                let mut window =
                    RollingWindow::new(definition.max_amount, window_ticks(definition.expiration));
                let granted = window.alloc(amount, tick, best_effort);
                if granted > 0 {
                    debug!(
                        key = %entry.key(),
                        capacity = window.capacity(),
                        window_ticks = window.window_ticks(),
                        "Creating rolling window"
                    );
                    entry.insert(window);
                }
                granted
            }
        }
    }

    fn release(
        &mut self,
        definition: &QuotaDefinition,
        key: &str,
        amount: i64,
        ticks: &dyn TickSource,
    ) -> i64 {
        if !definition.is_expiring() {
            return self.cells.release(key, amount);
        }

        let Some(window) = self.windows.get_mut(key) else {
            return 0;
        };

        let tick = ticks.now_ticks();
        let released = window.release(amount, tick);

        if window.in_use(tick) == 0 {
            // the window contains no useful state
            self.windows.remove(key);
        }
        released
    }
}

/// An in-memory quota engine.
///
/// The engine owns a background task that periodically reclaims
/// deduplication ids, so it must be created from within a Tokio runtime.
/// Call [`MemQuota::close`] or [`MemQuota::shutdown`] to stop that task; the
/// task also stops when the engine is dropped.
pub struct MemQuota {
    /// All mutable quota state
    state: Arc<Mutex<QuotaState>>,
    /// Source of the current tick for rolling windows
    ticks: Arc<dyn TickSource>,
    /// Stop signal for the reclamation task
    stop: watch::Sender<bool>,
    /// Handle of the reclamation task, taken on shutdown
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for MemQuota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemQuota")
            .field("cells", &state.cells.len())
            .field("windows", &state.windows.len())
            .field("dedup_ids", &state.dedup.len())
            .field("closed", &*self.stop.borrow())
            .finish()
    }
}

impl MemQuota {
    /// Create a new engine.
    ///
    /// `dedup_interval` is how often deduplication ids are reclaimed and must
    /// be non-zero.
    pub fn new(dedup_interval: Duration, ticks: Arc<dyn TickSource>) -> Result<Self> {
        if dedup_interval.is_zero() {
            return Err(QuotaError::Config(format!(
                "deduplication window of {:?} is invalid, must be > 0",
                dedup_interval
            )));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| QuotaError::Runtime(e.to_string()))?;

        let state = Arc::new(Mutex::new(QuotaState::default()));
        let (stop, stop_rx) = watch::channel(false);
        let reaper = runtime.spawn(reap_dedup(state.clone(), dedup_interval, stop_rx));

        info!(dedup_interval = ?dedup_interval, "Quota engine started");

        Ok(Self {
            state,
            ticks,
            stop,
            reaper: Mutex::new(Some(reaper)),
        })
    }

    /// Create a new engine from configuration, using the system clock.
    pub fn from_config(config: &MemQuotaConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.min_deduplication_duration(), Arc::new(SystemTicks))
    }

    /// Allocate exactly the requested amount, or nothing.
    pub fn alloc(&self, request: &QuotaRequest) -> Result<i64> {
        self.execute(request, Operation::Alloc { best_effort: false })
    }

    /// Allocate as much of the requested amount as is available.
    pub fn alloc_best_effort(&self, request: &QuotaRequest) -> Result<i64> {
        self.execute(request, Operation::Alloc { best_effort: true })
    }

    /// Allocate using the request's own best-effort flag.
    pub fn alloc_request(&self, request: &QuotaRequest) -> Result<i64> {
        self.execute(
            request,
            Operation::Alloc {
                best_effort: request.best_effort,
            },
        )
    }

    /// Release up to the requested amount.
    ///
    /// Never releases more than is currently in use for the key.
    pub fn release_best_effort(&self, request: &QuotaRequest) -> Result<i64> {
        self.execute(request, Operation::Release)
    }

    /// Run one deduplication reclamation.
    ///
    /// This normally happens on the background task; calling it directly is
    /// useful to drive expiry deterministically.
    pub fn reclaim(&self) {
        self.state.lock().dedup.reclaim();
    }

    /// Get the units currently in use for a quota and label set.
    pub fn in_use(&self, definition: &QuotaDefinition, labels: &Labels) -> i64 {
        let key = make_key(&definition.name, labels);
        let mut state = self.state.lock();

        if !definition.is_expiring() {
            return state.cells.in_use(&key);
        }
        let tick = self.ticks.now_ticks();
        state
            .windows
            .get_mut(&key)
            .map(|w| w.in_use(tick))
            .unwrap_or(0)
    }

    /// Get the units still available for a quota and label set.
    pub fn available(&self, definition: &QuotaDefinition, labels: &Labels) -> i64 {
        let key = make_key(&definition.name, labels);
        let mut state = self.state.lock();

        if !definition.is_expiring() {
            return (definition.max_amount - state.cells.in_use(&key)).max(0);
        }
        let tick = self.ticks.now_ticks();
        state
            .windows
            .get_mut(&key)
            .map(|w| w.available(tick))
            .unwrap_or_else(|| definition.max_amount.max(0))
    }

    /// Get the number of live non-expiring cells.
    pub fn cell_count(&self) -> usize {
        self.state.lock().cells.len()
    }

    /// Get the number of live rolling windows.
    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    /// Get the number of remembered deduplication ids.
    pub fn dedup_count(&self) -> usize {
        self.state.lock().dedup.len()
    }

    /// Signal the reclamation task to stop. Safe to call more than once.
    pub fn close(&self) {
        if !self.stop.send_replace(true) {
            info!("Quota engine closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.stop.borrow()
    }

    /// Stop the reclamation task and wait for it to finish.
    pub async fn shutdown(&self) {
        self.close();

        let reaper = self.reaper.lock().take();
        if let Some(reaper) = reaper {
            if let Err(e) = reaper.await {
                warn!(error = %e, "Deduplication reclamation task failed");
            }
        }
    }

    fn execute(&self, request: &QuotaRequest, op: Operation) -> Result<i64> {
        let definition = &request.definition;

        if request.amount < 0 {
            return Err(QuotaError::InvalidAmount(request.amount));
        }

        if request.amount == 0 {
            return Ok(0);
        }

        definition.check_labels(&request.labels)?;
        let key = make_key(&definition.name, &request.labels);

        trace!(
            key = %key,
            amount = request.amount,
            operation = ?op,
            "Executing quota operation"
        );

        let mut state = self.state.lock();

        if let Some(amount) = state.dedup.lookup(&request.dedup_id) {
            info!(
                dedup_id = %request.dedup_id,
                amount = amount,
                "Quota operation satisfied through deduplication"
            );
            return Ok(amount);
        }

        let result = match op {
            Operation::Alloc { best_effort } => {
                let granted = state.alloc(
                    definition,
                    key,
                    request.amount,
                    best_effort,
                    self.ticks.as_ref(),
                );
                if granted < request.amount {
                    debug!(
                        quota = %definition.name,
                        requested = request.amount,
                        granted = granted,
                        "Quota exhausted"
                    );
                }
                granted
            }
            Operation::Release => {
                state.release(definition, &key, request.amount, self.ticks.as_ref())
            }
        };

        state.dedup.record(&request.dedup_id, result);
        Ok(result)
    }
}

impl QuotaBackend for MemQuota {
    fn alloc(&self, request: &QuotaRequest) -> Result<i64> {
        MemQuota::alloc(self, request)
    }

    fn alloc_best_effort(&self, request: &QuotaRequest) -> Result<i64> {
        MemQuota::alloc_best_effort(self, request)
    }

    fn release_best_effort(&self, request: &QuotaRequest) -> Result<i64> {
        MemQuota::release_best_effort(self, request)
    }

    fn close(&self) {
        MemQuota::close(self)
    }
}

/// Periodically reclaim deduplication ids until told to stop.
///
/// The stop signal also fires when the engine, and with it the sender, is
/// dropped.
async fn reap_dedup(
    state: Arc<Mutex<QuotaState>>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut state = state.lock();
                state.dedup.reclaim();
                trace!(remaining = state.dedup.len(), "Reclaimed deduplication ids");
            }
            _ = stop.changed() => break,
        }
    }

    debug!("Deduplication reclamation stopped");
}
