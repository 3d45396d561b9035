//! Aggregates progress reports from long-running jobs into one indicator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Upper bound of the aggregate percentage.
pub const MAX_PROGRESS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Started,
    SetUp,
    Completed,
    Canceled,
}

/// One job's latest report. Byte counts and the time estimate are `-1`
/// when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub id: String,
    pub state: JobState,
    pub message: Option<String>,
    pub has_failures: bool,
    #[serde(default = "unknown")]
    pub current_bytes: i64,
    #[serde(default = "unknown")]
    pub required_bytes: i64,
    #[serde(default = "unknown")]
    pub ms_remaining: i64,
}

fn unknown() -> i64 {
    -1
}

impl JobProgress {
    pub fn new(id: impl Into<String>, state: JobState) -> Self {
        Self {
            id: id.into(),
            state,
            message: None,
            has_failures: false,
            current_bytes: -1,
            required_bytes: -1,
            ms_remaining: -1,
        }
    }

    pub fn with_bytes(mut self, current: i64, required: i64) -> Self {
        self.current_bytes = current;
        self.required_bytes = required;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_failures(mut self, has_failures: bool) -> Self {
        self.has_failures = has_failures;
        self
    }

    pub fn with_ms_remaining(mut self, ms: i64) -> Self {
        self.ms_remaining = ms;
        self
    }

    fn has_known_bytes(&self) -> bool {
        self.current_bytes != -1 && self.required_bytes != -1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "percent")]
pub enum ProgressState {
    Invisible,
    Indeterminate,
    /// Determinate, `0..=MAX_PROGRESS`.
    Visible(u32),
}

/// Notified synchronously after every update.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, state: ProgressState);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressState) + Send + Sync,
{
    fn on_progress(&self, state: ProgressState) {
        self(state)
    }
}

#[derive(Default)]
struct Jobs {
    order: Vec<String>,
    by_id: HashMap<String, JobProgress>,
}

/// Keyed job registry: last write wins per id, first-seen order is kept.
#[derive(Default)]
pub struct JobProgressTracker {
    jobs: Mutex<Jobs>,
    observers: Mutex<Vec<Arc<dyn ProgressObserver>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn ProgressObserver>) {
        lock(&self.observers).push(observer);
    }

    /// Records a batch of reports and returns the new aggregate.
    pub fn update<I>(&self, reports: I) -> ProgressState
    where
        I: IntoIterator<Item = JobProgress>,
    {
        let state = {
            let mut jobs = lock(&self.jobs);
            for report in reports {
                debug!(job = %report.id, state = ?report.state, "Job progress");
                if !jobs.by_id.contains_key(&report.id) {
                    jobs.order.push(report.id.clone());
                }
                jobs.by_id.insert(report.id.clone(), report);
            }
            aggregate(jobs.by_id.values())
        };
        self.notify(state);
        state
    }

    /// Drops a dismissed job. Returns whether it was tracked.
    pub fn remove(&self, id: &str) -> bool {
        let (removed, state) = {
            let mut jobs = lock(&self.jobs);
            let removed = jobs.by_id.remove(id).is_some();
            jobs.order.retain(|j| j != id);
            (removed, aggregate(jobs.by_id.values()))
        };
        if removed {
            self.notify(state);
        }
        removed
    }

    pub fn state(&self) -> ProgressState {
        aggregate(lock(&self.jobs).by_id.values())
    }

    /// Tracked jobs in first-seen order.
    pub fn jobs(&self) -> Vec<JobProgress> {
        let jobs = lock(&self.jobs);
        jobs.order
            .iter()
            .filter_map(|id| jobs.by_id.get(id).cloned())
            .collect()
    }

    fn notify(&self, state: ProgressState) {
        let observers: Vec<_> = lock(&self.observers).clone();
        for observer in observers {
            observer.on_progress(state);
        }
    }
}

/// Invisible with no jobs; byte-weighted percentage when any job knows its
/// byte counts; 100% when every job completed; indeterminate otherwise.
fn aggregate<'a, I>(jobs: I) -> ProgressState
where
    I: IntoIterator<Item = &'a JobProgress>,
{
    let mut any = false;
    let mut all_finished = true;
    let mut current: i64 = 0;
    let mut required: i64 = 0;
    for job in jobs {
        any = true;
        if job.state != JobState::Completed {
            all_finished = false;
        }
        if job.has_known_bytes() {
            current = current.saturating_add(job.current_bytes);
            required = required.saturating_add(job.required_bytes);
        }
    }

    if !any {
        ProgressState::Invisible
    } else if required != 0 {
        let percent = (i128::from(MAX_PROGRESS) * i128::from(current) / i128::from(required))
            .clamp(0, i128::from(MAX_PROGRESS));
        ProgressState::Visible(percent as u32)
    } else if all_finished {
        ProgressState::Visible(MAX_PROGRESS)
    } else {
        ProgressState::Indeterminate
    }
}
