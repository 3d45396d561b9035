//! Loaders and the host that drives their lifecycle.
//!
//! A loader ([`FolderLoader`], [`SearchLoader`]) knows how to produce one
//! [`DirectoryResult`] from a [`LoadContext`]. The [`LoaderHost`] owns the
//! state machine around it: idle, loading, delivered (and back to loading on
//! invalidation), then reset. It runs each load cycle on a background
//! thread, keeps at most one current result and closes whatever it
//! supersedes.

mod folder;
mod result;
mod search;
mod task;

pub use folder::FolderLoader;
pub use result::{DirectoryResult, Target};
pub use search::SearchLoader;
pub use task::{QueryTask, TaskState};

use crate::cancel::CancellationSignal;
use crate::error::ScourError;
use crate::gate::CountdownGate;
use crate::stream::ChangeObserver;
use result::close_quietly;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use tracing::{debug, error, warn};

/// Something that can run one load cycle off the caller's thread.
pub trait BackgroundLoad: Send + Sync + 'static {
    fn load_in_background(&self, ctx: &LoadContext) -> crate::Result<DirectoryResult>;

    /// Releases per-loader resources when the host is reset.
    fn on_reset(&self) {}
}

#[derive(Default)]
struct CycleSlot {
    interrupted: bool,
    gate: Option<Arc<CountdownGate>>,
}

/// Per-cycle handle shared between the host and the running load: the
/// downstream cancellation signal, the gate the cycle is blocked on (so it
/// can be interrupted) and the subscriber to register on the final stream.
#[derive(Clone)]
pub struct LoadContext {
    cycle: u64,
    signal: CancellationSignal,
    slot: Arc<Mutex<CycleSlot>>,
    observer: Option<Arc<dyn ChangeObserver>>,
}

impl LoadContext {
    pub fn new(observer: Option<Arc<dyn ChangeObserver>>) -> Self {
        Self::for_cycle(0, observer)
    }

    /// A context for the host's `cycle`. Cycle numbers only grow, so a
    /// loader can tell a superseded cycle from the current one.
    pub fn for_cycle(cycle: u64, observer: Option<Arc<dyn ChangeObserver>>) -> Self {
        Self {
            cycle,
            signal: CancellationSignal::new(),
            slot: Arc::new(Mutex::new(CycleSlot::default())),
            observer,
        }
    }

    /// A context with no host attached, for driving a loader directly.
    pub fn detached() -> Self {
        Self::new(None)
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    pub fn cancel(&self) {
        self.signal.cancel();
    }

    pub fn observer(&self) -> Option<&Arc<dyn ChangeObserver>> {
        self.observer.as_ref()
    }

    fn lock_slot(&self) -> MutexGuard<'_, CycleSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates the countdown gate for this cycle. If the cycle was already
    /// interrupted the gate comes back interrupted.
    pub fn new_gate(&self, count: usize) -> Arc<CountdownGate> {
        let gate = Arc::new(CountdownGate::new(count));
        let mut slot = self.lock_slot();
        if slot.interrupted {
            gate.interrupt();
        }
        slot.gate = Some(Arc::clone(&gate));
        gate
    }

    /// Interrupts the cycle's gate wait, now or as soon as a gate exists.
    pub fn interrupt(&self) {
        let mut slot = self.lock_slot();
        slot.interrupted = true;
        if let Some(gate) = &slot.gate {
            gate.interrupt();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.lock_slot().interrupted
    }
}

/// What a host tells its listener after a cycle.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Delivered(Arc<DirectoryResult>),
    Failed(Arc<ScourError>),
}

type Listener = Arc<dyn Fn(LoadOutcome) + Send + Sync>;

struct InFlight {
    cycle: u64,
    ctx: LoadContext,
}

#[derive(Default)]
struct HostState {
    started: bool,
    reset: bool,
    content_changed: bool,
    result: Option<Arc<DirectoryResult>>,
    next_cycle: u64,
    in_flight: Option<InFlight>,
}

struct HostShared<L> {
    loader: L,
    state: Mutex<HostState>,
    listener: Mutex<Option<Listener>>,
}

/// Drives a loader through start/stop/reset and owns its current result.
///
/// Dropping the host resets it.
pub struct LoaderHost<L: BackgroundLoad> {
    shared: Arc<HostShared<L>>,
}

impl<L: BackgroundLoad> LoaderHost<L> {
    pub fn new(loader: L) -> Self {
        Self {
            shared: Arc::new(HostShared {
                loader,
                state: Mutex::new(HostState::default()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Registers the callback that receives every outcome. Called from the
    /// loader thread, or from the caller's thread for cached deliveries.
    pub fn set_listener<F>(&self, listener: F)
    where
        F: Fn(LoadOutcome) + Send + Sync + 'static,
    {
        *self
            .shared
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(listener));
    }

    pub fn loader(&self) -> &L {
        &self.shared.loader
    }

    /// Subscriber that reloads this host when the rows behind its result
    /// change. Holds the host weakly.
    pub fn observer(&self) -> Arc<dyn ChangeObserver> {
        HostShared::observer(&self.shared)
    }

    pub fn start_loading(&self) {
        HostShared::start_loading(&self.shared);
    }

    /// Stops delivering and cancels the in-flight cycle. The current result
    /// is kept.
    pub fn stop_loading(&self) {
        self.shared.lock_state().started = false;
        self.shared.cancel_load();
    }

    /// Starts a fresh cycle, cancelling the one in flight.
    pub fn force_load(&self) {
        HostShared::force_load(&self.shared);
    }

    /// Cancels the in-flight cycle; its result is closed when it lands.
    /// Returns whether there was one.
    pub fn cancel_load(&self) -> bool {
        self.shared.cancel_load()
    }

    /// Interrupts the in-flight cycle's gate wait. The cycle fails with
    /// [`ScourError::Interrupted`].
    pub fn interrupt_load(&self) -> bool {
        let state = self.shared.lock_state();
        match &state.in_flight {
            Some(flight) => {
                flight.ctx.interrupt();
                true
            }
            None => false,
        }
    }

    pub fn on_content_changed(&self) {
        HostShared::on_content_changed(&self.shared);
    }

    /// Terminal: stops, lets the loader release its resources and closes
    /// the held result.
    pub fn reset(&self) {
        self.shared.reset();
    }

    pub fn result(&self) -> Option<Arc<DirectoryResult>> {
        self.shared.lock_state().result.clone()
    }

    pub fn is_started(&self) -> bool {
        self.shared.lock_state().started
    }

    pub fn is_reset(&self) -> bool {
        self.shared.lock_state().reset
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock_state().in_flight.is_some()
    }
}

impl<L: BackgroundLoad> Drop for LoaderHost<L> {
    fn drop(&mut self) {
        self.shared.reset();
    }
}

struct HostObserver<L> {
    shared: Weak<HostShared<L>>,
}

impl<L: BackgroundLoad> ChangeObserver for HostObserver<L> {
    fn on_change(&self) {
        if let Some(shared) = self.shared.upgrade() {
            HostShared::on_content_changed(&shared);
        }
    }
}

impl<L: BackgroundLoad> HostShared<L> {
    fn lock_state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, outcome: LoadOutcome) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener(outcome);
        }
    }

    fn observer(this: &Arc<Self>) -> Arc<dyn ChangeObserver> {
        Arc::new(HostObserver {
            shared: Arc::downgrade(this),
        })
    }

    fn start_loading(this: &Arc<Self>) {
        let (cached, needs_load) = {
            let mut state = this.lock_state();
            if state.reset {
                warn!("Ignoring start on a reset loader");
                return;
            }
            state.started = true;
            let stale = state.result.as_ref().map_or(true, |r| r.is_stale());
            let needs_load = state.content_changed || stale;
            let cached = if stale { None } else { state.result.clone() };
            (cached, needs_load)
        };
        if let Some(result) = cached {
            debug!(rows = result.len(), "Delivering cached result");
            this.notify(LoadOutcome::Delivered(result));
        }
        if needs_load {
            Self::force_load(this);
        }
    }

    fn force_load(this: &Arc<Self>) {
        let observer = Self::observer(this);
        let (cycle, ctx) = {
            let mut state = this.lock_state();
            if state.reset {
                warn!("Ignoring load on a reset loader");
                return;
            }
            if let Some(previous) = state.in_flight.take() {
                debug!(cycle = previous.cycle, "Cancelling superseded load");
                previous.ctx.cancel();
            }
            state.next_cycle += 1;
            state.content_changed = false;
            let cycle = state.next_cycle;
            let ctx = LoadContext::for_cycle(cycle, Some(observer));
            state.in_flight = Some(InFlight {
                cycle,
                ctx: ctx.clone(),
            });
            (cycle, ctx)
        };

        let shared = Arc::clone(this);
        let cycle_ctx = ctx.clone();
        let spawned = thread::Builder::new()
            .name("scour-loader".to_string())
            .spawn(move || {
                debug!(cycle, "Load started");
                let outcome = shared.loader.load_in_background(&cycle_ctx);
                shared.complete(cycle, &cycle_ctx, outcome);
            });
        if let Err(err) = spawned {
            error!(error = %err, "Failed to spawn loader thread");
            this.complete(cycle, &ctx, Err(ScourError::Io(err)));
        }
    }

    /// Takes the in-flight slot if it still belongs to `cycle`.
    fn finish_cycle(state: &mut HostState, cycle: u64) -> bool {
        let current = state.in_flight.as_ref().is_some_and(|f| f.cycle == cycle);
        if current {
            state.in_flight = None;
        }
        current
    }

    fn complete(&self, cycle: u64, ctx: &LoadContext, outcome: crate::Result<DirectoryResult>) {
        match outcome {
            Ok(result) => {
                let result = Arc::new(result);
                let (deliver, previous) = {
                    let mut state = self.lock_state();
                    let current = Self::finish_cycle(&mut state, cycle);
                    if !current || ctx.is_cancelled() || state.reset {
                        drop(state);
                        debug!(cycle, "Discarding result of cancelled load");
                        close_quietly(&result);
                        return;
                    }
                    let previous = state.result.replace(Arc::clone(&result));
                    (state.started, previous)
                };
                debug!(
                    cycle,
                    rows = result.len(),
                    partial = result.is_partial(),
                    "Load finished"
                );
                if let Some(previous) = previous {
                    if !Arc::ptr_eq(&previous, &result) {
                        close_quietly(&previous);
                    }
                }
                if deliver {
                    self.notify(LoadOutcome::Delivered(result));
                }
            }
            Err(err) => {
                {
                    let mut state = self.lock_state();
                    let current = Self::finish_cycle(&mut state, cycle);
                    if !current || ctx.is_cancelled() || state.reset {
                        debug!(cycle, error = %err, "Cancelled load failed");
                        return;
                    }
                }
                error!(cycle, error = %err, "Load failed");
                self.notify(LoadOutcome::Failed(Arc::new(err)));
            }
        }
    }

    fn cancel_load(&self) -> bool {
        let flight = self.lock_state().in_flight.take();
        match flight {
            Some(flight) => {
                debug!(cycle = flight.cycle, "Cancelling load");
                flight.ctx.cancel();
                true
            }
            None => false,
        }
    }

    fn on_content_changed(this: &Arc<Self>) {
        let started = {
            let mut state = this.lock_state();
            if state.reset {
                return;
            }
            if !state.started {
                state.content_changed = true;
            }
            state.started
        };
        if started {
            Self::force_load(this);
        }
    }

    fn reset(&self) {
        let (flight, result) = {
            let mut state = self.lock_state();
            if state.reset {
                return;
            }
            state.reset = true;
            state.started = false;
            (state.in_flight.take(), state.result.take())
        };
        if let Some(flight) = flight {
            flight.ctx.cancel();
        }
        self.loader.on_reset();
        if let Some(result) = result {
            close_quietly(&result);
        }
        debug!("Loader reset");
    }
}
