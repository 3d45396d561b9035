//! One per-root unit of concurrent search work.

use crate::args::QueryArgs;
use crate::cancel::CancellationSignal;
use crate::client::LocationQueryClient;
use crate::gate::CountdownGate;
use crate::location::Location;
use crate::stream::RowStream;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

/// Lifecycle of a [`QueryTask`], polled by the orchestrator after the
/// countdown gate.
#[derive(Debug, Clone)]
pub enum TaskState {
    Pending,
    Running,
    Done(RowStream),
    Empty,
    /// The stream was handed to the orchestrator.
    Collected,
    /// Closed before or while running; a late stream is discarded.
    Cancelled,
}

pub struct QueryTask {
    root_id: String,
    location: Location,
    args: QueryArgs,
    max_results: usize,
    client: Arc<dyn LocationQueryClient>,
    signal: CancellationSignal,
    gate: Arc<CountdownGate>,
    state: Mutex<TaskState>,
}

impl QueryTask {
    pub fn new(
        root_id: impl Into<String>,
        location: Location,
        args: QueryArgs,
        max_results: usize,
        client: Arc<dyn LocationQueryClient>,
        signal: CancellationSignal,
        gate: Arc<CountdownGate>,
    ) -> Self {
        Self {
            root_id: root_id.into(),
            location,
            args,
            max_results,
            client,
            signal,
            gate,
            state: Mutex::new(TaskState::Pending),
        }
    }

    pub fn task_id(&self) -> String {
        self.location.to_string()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn args(&self) -> &QueryArgs {
        &self.args
    }

    fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> TaskState {
        self.lock_state().clone()
    }

    /// Finished one way or another: done, empty, collected or cancelled.
    pub fn is_done(&self) -> bool {
        !matches!(*self.lock_state(), TaskState::Pending | TaskState::Running)
    }

    /// Runs the fetch. The gate is counted down exactly once on every exit
    /// path, including a panicking client.
    pub fn run(&self) {
        let _countdown = self.gate.guard();
        {
            let mut state = self.lock_state();
            if !matches!(*state, TaskState::Pending) {
                return;
            }
            *state = TaskState::Running;
        }

        let start = Instant::now();
        let fetched = panic::catch_unwind(AssertUnwindSafe(|| {
            self.client.fetch(
                &self.root_id,
                &self.location,
                &self.args,
                self.max_results,
                &self.signal,
            )
        }));
        let stream = fetched.unwrap_or_else(|_| {
            warn!(task = %self.task_id(), "Query panicked");
            None
        });

        {
            let mut state = self.lock_state();
            let cancelled = matches!(*state, TaskState::Cancelled);
            match stream {
                Some(late) if cancelled => {
                    if let Err(err) = late.close() {
                        warn!(task = %self.task_id(), error = %err, "Failed to close late stream");
                    }
                }
                _ if cancelled => {}
                Some(stream) => *state = TaskState::Done(stream),
                None => *state = TaskState::Empty,
            }
        }
        debug!(
            task = %self.task_id(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query finished"
        );
    }

    /// Hands a completed stream to the caller. Running, empty and cancelled
    /// tasks yield nothing.
    pub fn take_stream(&self) -> Option<RowStream> {
        let mut state = self.lock_state();
        match std::mem::replace(&mut *state, TaskState::Collected) {
            TaskState::Done(stream) => Some(stream),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Releases the task. A stream that was never collected is closed; a
    /// fetch still in flight is not aborted, its result is discarded.
    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), TaskState::Cancelled);
        if let TaskState::Done(stream) = previous {
            if let Err(err) = stream.close() {
                warn!(task = %self.task_id(), error = %err, "Failed to close uncollected stream");
            }
        }
    }
}
