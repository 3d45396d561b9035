//! Scripted in-memory providers shared by the integration tests.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver};
use scour_core::{
    CancellationSignal, DirectoryResult, DocumentsProvider, ExtensionLookup, Location,
    LoadOutcome, LoaderHost, LocationQueryClient, ProfileId, ProfileQueryClient,
    ProviderRegistry, QueryArgs, QueryOptions, RootRef, Row, RowSource, RowStream, SearchLoader,
    SortModel,
};
use scour_core::loader::BackgroundLoad;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(10);
pub const HOUR_MS: i64 = 3_600_000;

#[derive(Clone)]
pub enum Behaviour {
    Rows(Vec<Row>),
    Slow(Duration, Vec<Row>),
    Fail,
    Panic,
    Missing,
}

/// Provider answering every location of its authority the same way.
pub struct Scripted {
    behaviour: Behaviour,
    pub calls: AtomicUsize,
    pub seen_args: Mutex<Vec<(Location, QueryArgs)>>,
    sources: Mutex<Vec<Arc<RowSource>>>,
}

impl Scripted {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
            seen_args: Mutex::new(Vec::new()),
            sources: Mutex::new(Vec::new()),
        })
    }

    pub fn rows(rows: Vec<Row>) -> Arc<Self> {
        Self::new(Behaviour::Rows(rows))
    }

    /// Signals a change on every source this provider handed out.
    pub fn notify_changed(&self) {
        let sources = self.sources.lock().unwrap().clone();
        for source in sources {
            source.notify_changed();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn stream(&self, location: &Location, rows: &[Row]) -> RowStream {
        let source = RowSource::new(location.to_string());
        self.sources.lock().unwrap().push(Arc::clone(&source));
        RowStream::with_source(rows.to_vec(), source)
    }
}

impl DocumentsProvider for Scripted {
    fn query(
        &self,
        location: &Location,
        args: &QueryArgs,
        _cancel: &CancellationSignal,
    ) -> scour_core::Result<Option<RowStream>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_args
            .lock()
            .unwrap()
            .push((location.clone(), args.clone()));
        match &self.behaviour {
            Behaviour::Rows(rows) => Ok(Some(self.stream(location, rows))),
            Behaviour::Slow(delay, rows) => {
                std::thread::sleep(*delay);
                Ok(Some(self.stream(location, rows)))
            }
            Behaviour::Fail => Err(scour_core::ScourError::provider(
                location.authority().unwrap_or_default(),
                "remote unavailable",
            )),
            Behaviour::Panic => panic!("provider crashed"),
            Behaviour::Missing => Ok(None),
        }
    }
}

/// One root per provider, each under its own authority `a<i>`.
pub fn roots_for(providers: &[Arc<Scripted>]) -> (Arc<dyn LocationQueryClient>, Vec<RootRef>) {
    let mut registry = ProviderRegistry::new();
    let mut roots = Vec::new();
    for (i, provider) in providers.iter().enumerate() {
        let authority = format!("a{i}");
        registry.register(ProfileId::DEFAULT, authority.clone(), Arc::clone(provider) as _);
        roots.push(RootRef::new(authority, "root"));
    }
    let client = ProfileQueryClient::new(vec![ProfileId::DEFAULT], registry);
    (Arc::new(client), roots)
}

pub fn pool(threads: usize) -> Arc<rayon::ThreadPool> {
    Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap(),
    )
}

pub fn search(
    providers: &[Arc<Scripted>],
    query: Option<&str>,
    options: QueryOptions,
) -> scour_core::Result<SearchLoader> {
    let (client, roots) = roots_for(providers);
    SearchLoader::new(
        client,
        Arc::new(ExtensionLookup::new()),
        roots,
        query.map(str::to_string),
        options,
        Arc::new(SortModel::default()),
        pool(providers.len().max(1)),
    )
}

pub fn now() -> i64 {
    scour_core::options::now_millis()
}

/// `n` text files named `<prefix><i>.txt`, the i-th modified `i` hours ago.
pub fn files_by_hour(prefix: &str, n: usize) -> Vec<Row> {
    let now = now();
    (0..n)
        .map(|i| {
            Row::new(
                format!("{prefix}{i}"),
                format!("{prefix}{i}.txt"),
                "text/plain",
                now - i as i64 * HOUR_MS,
            )
        })
        .collect()
}

pub fn ids(result: &DirectoryResult) -> Vec<String> {
    result
        .stream()
        .map(|s| s.iter().map(|r| r.document_id.clone()).collect())
        .unwrap_or_default()
}

pub fn sorted_ids(result: &DirectoryResult) -> Vec<String> {
    let mut ids = ids(result);
    ids.sort();
    ids
}

/// Wires a host to a channel so tests can wait on outcomes.
pub fn listen<L: BackgroundLoad>(host: &LoaderHost<L>) -> Receiver<LoadOutcome> {
    let (tx, rx) = unbounded();
    host.set_listener(move |outcome| {
        let _ = tx.send(outcome);
    });
    rx
}

pub fn expect_delivered(rx: &Receiver<LoadOutcome>) -> Arc<DirectoryResult> {
    match rx.recv_timeout(WAIT).expect("no outcome in time") {
        LoadOutcome::Delivered(result) => result,
        LoadOutcome::Failed(err) => panic!("load failed: {err}"),
    }
}
