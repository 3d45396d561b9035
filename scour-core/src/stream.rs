//! Row streams: ordered, closable sequences of rows with change
//! notification.
//!
//! A [`RowSource`] is the handle a provider hands out for one query. Every
//! stream derived from it (filtered, sorted, merged) keeps the source alive
//! and shares its closed state, so closing any derived stream releases the
//! backing query.

use crate::error::ScourError;
use crate::row::Row;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Subscriber told that the data behind a stream changed.
pub trait ChangeObserver: Send + Sync {
    fn on_change(&self);
}

impl<F> ChangeObserver for F
where
    F: Fn() + Send + Sync,
{
    fn on_change(&self) {
        self()
    }
}

type ReleaseHook = Box<dyn FnOnce() -> crate::Result<()> + Send>;

/// Backing handle for the rows of a single provider query.
pub struct RowSource {
    label: String,
    closed: AtomicBool,
    detached: AtomicBool,
    observers: Mutex<Vec<Arc<dyn ChangeObserver>>>,
    release: Mutex<Option<ReleaseHook>>,
}

impl RowSource {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            closed: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            observers: Mutex::new(Vec::new()),
            release: Mutex::new(None),
        })
    }

    /// A source that runs `release` once when first closed. A failing hook
    /// surfaces as [`ScourError::StreamClosed`] from `close`.
    pub fn with_release<F>(label: impl Into<String>, release: F) -> Arc<Self>
    where
        F: FnOnce() -> crate::Result<()> + Send + 'static,
    {
        let source = Self::new(label);
        *lock(&source.release) = Some(Box::new(release));
        source
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Marks the backing data as gone. Cursors over this source can no
    /// longer reposition.
    pub fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    pub fn register_observer(&self, observer: Arc<dyn ChangeObserver>) {
        if self.is_closed() {
            return;
        }
        lock(&self.observers).push(observer);
    }

    /// Invokes every registered observer synchronously. Observers run
    /// outside the registry lock so they may re-enter.
    pub fn notify_changed(&self) {
        if self.is_closed() {
            return;
        }
        let observers: Vec<_> = lock(&self.observers).clone();
        debug!(source = %self.label, observers = observers.len(), "Row source changed");
        for observer in observers {
            observer.on_change();
        }
    }

    /// Closes the source. Only the first call runs the release hook.
    pub fn close(&self) -> crate::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        lock(&self.observers).clear();
        let hook = lock(&self.release).take();
        match hook {
            Some(release) => release().map_err(|e| ScourError::StreamClosed {
                label: self.label.clone(),
                message: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSource")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .field("detached", &self.is_detached())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered rows plus the sources they were derived from. Clones share both.
#[derive(Clone)]
pub struct RowStream {
    rows: Arc<[Row]>,
    sources: Arc<[Arc<RowSource>]>,
}

impl RowStream {
    /// Wraps rows in a fresh, private source.
    pub fn new(rows: Vec<Row>) -> Self {
        Self::with_source(rows, RowSource::new("rows"))
    }

    pub fn with_source(rows: Vec<Row>, source: Arc<RowSource>) -> Self {
        Self {
            rows: rows.into(),
            sources: vec![source].into(),
        }
    }

    /// An empty stream that still has its own closed state.
    pub fn empty() -> Self {
        Self::with_source(Vec::new(), RowSource::new("empty"))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn sources(&self) -> &[Arc<RowSource>] {
        &self.sources
    }

    pub fn is_closed(&self) -> bool {
        self.sources.iter().any(|s| s.is_closed())
    }

    /// True if both handles are clones of one stream.
    pub fn same_instance(&self, other: &RowStream) -> bool {
        Arc::ptr_eq(&self.rows, &other.rows) && Arc::ptr_eq(&self.sources, &other.sources)
    }

    /// Closes every backing source. All sources are attempted; the first
    /// failure is returned.
    pub fn close(&self) -> crate::Result<()> {
        let mut first_err = None;
        for source in self.sources.iter() {
            if let Err(err) = source.close() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Subscribes `observer` to changes of any backing source.
    pub fn register_observer(&self, observer: Arc<dyn ChangeObserver>) {
        for source in self.sources.iter() {
            source.register_observer(Arc::clone(&observer));
        }
    }

    pub fn cursor(&self) -> Cursor<'_> {
        Cursor {
            stream: self,
            position: None,
        }
    }

    /// Keeps the rows matching `keep`, in order, over the same sources.
    pub fn retain<F>(&self, mut keep: F) -> RowStream
    where
        F: FnMut(&Row) -> bool,
    {
        let rows: Vec<Row> = self.rows.iter().filter(|r| keep(*r)).cloned().collect();
        self.derive(rows)
    }

    /// Rewrites the rows over the same sources.
    pub fn map_rows<F>(&self, f: F) -> RowStream
    where
        F: FnOnce(Vec<Row>) -> Vec<Row>,
    {
        self.derive(f(self.rows.to_vec()))
    }

    fn derive(&self, rows: Vec<Row>) -> RowStream {
        RowStream {
            rows: rows.into(),
            sources: Arc::clone(&self.sources),
        }
    }

    /// Concatenates streams in order, unioning their sources.
    pub(crate) fn concat(streams: Vec<RowStream>) -> RowStream {
        let total = streams.iter().map(RowStream::len).sum();
        let mut rows = Vec::with_capacity(total);
        let mut sources = Vec::new();
        for stream in &streams {
            rows.extend(stream.rows.iter().cloned());
            for source in stream.sources.iter() {
                if !sources.iter().any(|s| Arc::ptr_eq(s, source)) {
                    sources.push(Arc::clone(source));
                }
            }
        }
        RowStream {
            rows: rows.into(),
            sources: sources.into(),
        }
    }

    fn is_available(&self) -> bool {
        self.sources
            .iter()
            .all(|s| !s.is_closed() && !s.is_detached())
    }
}

impl fmt::Debug for RowStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("rows", &self.rows.len())
            .field("sources", &self.sources)
            .finish()
    }
}

impl<'a> IntoIterator for &'a RowStream {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Positional reader over a stream. Every move fails once a backing source
/// is closed or detached.
pub struct Cursor<'a> {
    stream: &'a RowStream,
    position: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub fn count(&self) -> usize {
        self.stream.len()
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Moves before the first row.
    pub fn move_to_start(&mut self) -> bool {
        if !self.stream.is_available() {
            return false;
        }
        self.position = None;
        true
    }

    pub fn move_to_position(&mut self, position: usize) -> bool {
        if !self.stream.is_available() || position >= self.count() {
            return false;
        }
        self.position = Some(position);
        true
    }

    pub fn move_to_next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        self.move_to_position(next)
    }

    pub fn row(&self) -> Option<&'a Row> {
        if !self.stream.is_available() {
            return None;
        }
        self.position.and_then(|p| self.stream.rows.get(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn rows(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .map(|n| Row::new(*n, *n, "text/plain", 0))
            .collect()
    }

    #[test]
    fn cursor_walks_every_row() {
        let stream = RowStream::new(rows(&["a", "b", "c"]));
        let mut cursor = stream.cursor();
        assert!(cursor.move_to_start());
        let mut seen = Vec::new();
        while cursor.move_to_next() {
            seen.push(cursor.row().unwrap().display_name.clone());
        }
        assert_eq!(seen, ["a", "b", "c"]);
        assert!(!cursor.move_to_position(3));
    }

    #[test]
    fn cursor_fails_after_close_or_detach() {
        let stream = RowStream::new(rows(&["a"]));
        stream.sources()[0].detach();
        assert!(!stream.cursor().move_to_start());
        assert!(!stream.is_closed());

        let stream = RowStream::new(rows(&["a"]));
        stream.close().unwrap();
        assert!(stream.is_closed());
        assert!(!stream.cursor().move_to_position(0));
    }

    #[test]
    fn derived_streams_share_closed_state() {
        let stream = RowStream::new(rows(&["a", "b", ".c"]));
        let visible = stream.retain(|r| !r.is_hidden());
        assert_eq!(visible.len(), 2);
        assert_eq!(stream.len(), 3);

        visible.close().unwrap();
        assert!(stream.is_closed());
    }

    #[test]
    fn observers_fire_until_closed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let stream = RowStream::new(rows(&["a"]));
        let counter = Arc::clone(&hits);
        stream.register_observer(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        stream.sources()[0].notify_changed();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        stream.close().unwrap();
        stream.sources()[0].notify_changed();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_hook_runs_once_and_reports_failure() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let source = RowSource::with_release("flaky", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ScourError::provider("local", "connection reset"))
        });
        let stream = RowStream::with_source(rows(&["a"]), source);

        assert!(matches!(
            stream.close(),
            Err(ScourError::StreamClosed { .. })
        ));
        assert!(stream.close().is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concat_dedupes_shared_sources() {
        let base = RowStream::new(rows(&["a", "b"]));
        let first = base.retain(|r| r.display_name == "a");
        let second = base.retain(|r| r.display_name == "b");
        let merged = RowStream::concat(vec![first, second]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.sources().len(), 1);
    }
}
