//! Multi-root search: one query task per root, run in parallel on a shared
//! pool under a single time budget, then merged, filtered and sorted.

use super::task::QueryTask;
use super::{BackgroundLoad, DirectoryResult, LoadContext, Target};
use crate::args::{QueryArgs, QUERY_ARG_DISPLAY_NAME, QUERY_ARG_LAST_MODIFIED_AFTER};
use crate::client::LocationQueryClient;
use crate::error::ScourError;
use crate::filter::{CategoryMatcher, RowFilterPipeline};
use crate::gate::CountdownGate;
use crate::location::{Location, RootRef};
use crate::merge::merge_streams;
use crate::mime::MimeTypeLookup;
use crate::options::QueryOptions;
use crate::sort::RowOrdering;
use crate::stream::ChangeObserver;
use rayon::ThreadPool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

pub struct SearchLoader {
    client: Arc<dyn LocationQueryClient>,
    lookup: Arc<dyn MimeTypeLookup>,
    roots: Vec<RootRef>,
    query: Option<String>,
    options: QueryOptions,
    categories: CategoryMatcher,
    ordering: Arc<dyn RowOrdering>,
    pool: Arc<ThreadPool>,
    observer: Option<Arc<dyn ChangeObserver>>,
    tasks: Mutex<TaskSet>,
}

/// Tasks held for the newest cycle that installed any. Once reset, nothing
/// is installed again.
#[derive(Default)]
struct TaskSet {
    cycle: u64,
    reset: bool,
    tasks: Vec<Arc<QueryTask>>,
}

impl SearchLoader {
    /// Fails with [`ScourError::InvalidArgument`] when neither a query nor
    /// a last-modified age bounds the search, or when a category is not a
    /// MIME pattern.
    pub fn new(
        client: Arc<dyn LocationQueryClient>,
        lookup: Arc<dyn MimeTypeLookup>,
        roots: Vec<RootRef>,
        query: Option<String>,
        options: QueryOptions,
        ordering: Arc<dyn RowOrdering>,
        pool: Arc<ThreadPool>,
    ) -> crate::Result<Self> {
        let query = query.filter(|q| !q.is_empty());
        if query.is_none() && options.max_last_modified_age.is_none() {
            return Err(ScourError::InvalidArgument(
                "search needs a query or a maximum last-modified age".to_string(),
            ));
        }
        let categories = CategoryMatcher::from_options(&options)?;

        let mut unique: Vec<RootRef> = Vec::with_capacity(roots.len());
        for root in roots {
            if !unique
                .iter()
                .any(|r| r.authority == root.authority && r.root_id == root.root_id)
            {
                unique.push(root);
            }
        }

        Ok(Self {
            client,
            lookup,
            roots: unique,
            query,
            options,
            categories,
            ordering,
            pool,
            observer: None,
            tasks: Mutex::new(TaskSet::default()),
        })
    }

    /// Subscriber registered on every merged result, in addition to the
    /// host's.
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn roots(&self) -> &[RootRef] {
        &self.roots
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    fn query_is_blank(&self) -> bool {
        self.query.is_none()
    }

    fn lock_tasks(&self) -> MutexGuard<'_, TaskSet> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tasks of the latest cycle, in submission order.
    pub fn tasks(&self) -> Vec<Arc<QueryTask>> {
        self.lock_tasks().tasks.clone()
    }

    /// Recents ignore MIME restrictions in the arguments, so a root is only
    /// browsed through its recents location when nothing narrows the query.
    pub fn location_for(&self, root: &RootRef) -> Location {
        if self.query_is_blank() && self.options.other_query_args.is_empty() {
            root.recent_location()
        } else {
            root.search_location()
        }
    }

    /// Sort hints, recency bound, name term, then caller extras (which win
    /// on key collision).
    pub fn query_args(&self, reject_before: i64) -> QueryArgs {
        let mut args = QueryArgs::new();
        self.ordering.add_query_sort_args(&mut args);
        if reject_before > 0 {
            args.put_int(QUERY_ARG_LAST_MODIFIED_AFTER, reject_before);
        }
        if let Some(query) = &self.query {
            args.put_str(QUERY_ARG_DISPLAY_NAME, query.clone());
        }
        args.put_all(&self.options.other_query_args);
        args
    }

    fn create_tasks(
        &self,
        ctx: &LoadContext,
        reject_before: i64,
        gate: &Arc<CountdownGate>,
    ) -> Vec<Arc<QueryTask>> {
        let mut tasks = Vec::with_capacity(self.roots.len());
        for root in &self.roots {
            if ctx.is_cancelled() {
                break;
            }
            let location = self.location_for(root);
            let args = self.query_args(reject_before);
            debug!(%location, args = ?args, "Creating query task");
            tasks.push(Arc::new(QueryTask::new(
                root.root_id.clone(),
                location,
                args,
                self.options.max_results,
                Arc::clone(&self.client),
                ctx.signal().clone(),
                Arc::clone(gate),
            )));
        }
        tasks
    }

    /// Swaps in the cycle's tasks and releases the ones they replace.
    ///
    /// A cancelled or superseded cycle, or any cycle after reset, installs
    /// nothing: its own tasks are closed instead and `false` is returned.
    fn replace_tasks(&self, ctx: &LoadContext, tasks: &[Arc<QueryTask>]) -> bool {
        let released = {
            let mut set = self.lock_tasks();
            if set.reset || ctx.is_cancelled() || ctx.cycle() < set.cycle {
                None
            } else {
                set.cycle = ctx.cycle();
                Some(std::mem::replace(&mut set.tasks, tasks.to_vec()))
            }
        };
        match released {
            Some(previous) => {
                for task in previous {
                    task.close();
                }
                true
            }
            None => {
                debug!(cycle = ctx.cycle(), "Cycle no longer current, releasing its tasks");
                for task in tasks {
                    task.close();
                }
                false
            }
        }
    }

    /// Blocks on the gate. Returns whether every task signalled in time.
    fn await_tasks(&self, gate: &CountdownGate) -> crate::Result<bool> {
        match self.options.max_query_time {
            None => {
                debug!("Waiting for results with no time limit");
                gate.wait()?;
                Ok(true)
            }
            Some(budget) => {
                debug!(budget_ms = budget.as_millis() as u64, "Waiting for results");
                gate.wait_timeout(budget)
            }
        }
    }
}

impl BackgroundLoad for SearchLoader {
    fn load_in_background(&self, ctx: &LoadContext) -> crate::Result<DirectoryResult> {
        let start = Instant::now();
        let mut result = DirectoryResult::new(Target::Search {
            query: self.query.clone(),
            roots: self.roots.clone(),
        })
        .with_stream(merge_streams(Vec::new()));

        let reject_before = self.options.reject_before_timestamp();
        let gate = ctx.new_gate(self.roots.len());
        let tasks = self.create_tasks(ctx, reject_before, &gate);
        debug!(tasks = tasks.len(), "Query tasks created");
        if !self.replace_tasks(ctx, &tasks) {
            return Ok(result);
        }

        for task in &tasks {
            let task = Arc::clone(task);
            self.pool.spawn(move || task.run());
        }

        let complete = match self.await_tasks(&gate) {
            Ok(complete) => complete,
            Err(err) => {
                debug!(pending = gate.remaining(), "Wait for query tasks interrupted");
                return Err(err);
            }
        };
        if !complete {
            debug!(
                pending = gate.remaining(),
                roots = tasks.len(),
                "Search time budget elapsed, returning partial results"
            );
            result.mark_partial();
        }

        let mut streams = Vec::with_capacity(tasks.len());
        for task in &tasks {
            if ctx.is_cancelled() {
                break;
            }
            if let Some(stream) = task.take_stream() {
                debug!(task = %task.task_id(), rows = stream.len(), "Collected task");
                streams.push(stream);
            }
        }
        debug!(streams = streams.len(), "Collection complete");

        let merged = merge_streams(streams);
        if let Some(observer) = &self.observer {
            merged.register_observer(Arc::clone(observer));
        }
        if let Some(observer) = ctx.observer() {
            merged.register_observer(Arc::clone(observer));
        }

        let pipeline = RowFilterPipeline::for_search(
            &self.options,
            reject_before,
            &self.categories,
            self.query_is_blank(),
        );
        let sorted = self
            .ordering
            .sort(pipeline.apply(merged), self.lookup.as_ref());
        result.set_stream(sorted);

        debug!(
            rows = result.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(result)
    }

    fn on_reset(&self) {
        let tasks = {
            let mut set = self.lock_tasks();
            set.reset = true;
            std::mem::take(&mut set.tasks)
        };
        for task in &tasks {
            task.close();
        }
        debug!(tasks = tasks.len(), "Search tasks released");
    }
}
