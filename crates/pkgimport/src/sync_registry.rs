//! Internally synchronized package registry
//!
//! [`SyncRegistry`] can be shared between threads. Every top-level import
//! runs as a batch owned by the calling thread: the packages the batch claims
//! are decoded on that thread and published together when the batch ends, so
//! no thread ever observes a package whose imports are still being decoded.
//! A thread that needs a package claimed by another batch waits for that
//! batch to settle and then shares its outcome.
//!
//! Batches on different threads that import each other would wait on each
//! other forever. Every wait is recorded in a wait-for map under the registry
//! lock; a thread whose wait would close a cycle abandons its batch instead,
//! waits for the batch it needed, and starts its import over. Abandoned
//! packages are discarded before any other thread can see them.

use crate::artifact::{package_id, ArtifactRequest, ArtifactSource, FsSource};
use crate::config::ImportConfig;
use crate::decode::DecodeOptions;
use crate::error::ImportError;
use crate::importer::{self, Resolve};
use crate::package::Package;
use crate::registry::RegistryStats;
use crate::types::TypeArena;
use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

type BatchId = u64;

/// How a claimed package left the registry's in-flight set
#[derive(Debug, Clone)]
enum Outcome {
    Published,
    Failed(ImportError),
    /// The owning batch backed out of a cycle; claim the path again
    Abandoned,
}

/// A package claimed by a batch that has not settled yet
#[derive(Debug)]
struct InFlight {
    package: Arc<Package>,
    batch: BatchId,
    outcome: Mutex<Option<Outcome>>,
    settled: Condvar,
}

impl InFlight {
    fn new(package: Arc<Package>, batch: BatchId) -> Self {
        Self {
            package,
            batch,
            outcome: Mutex::new(None),
            settled: Condvar::new(),
        }
    }

    /// Block until the owning batch settles
    fn wait(&self) -> Outcome {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(settled) = outcome.as_ref() {
                return settled.clone();
            }
            self.settled.wait(&mut outcome);
        }
    }

    fn settle(&self, outcome: Outcome) {
        *self.outcome.lock() = Some(outcome);
        self.settled.notify_all();
    }
}

#[derive(Debug)]
enum Entry {
    Ready(Arc<Package>),
    InFlight(Arc<InFlight>),
}

#[derive(Debug, Default)]
struct State {
    entries: FxHashMap<Arc<str>, Entry>,
    /// The flight each blocked batch waits on
    waiting: FxHashMap<BatchId, Arc<InFlight>>,
}

impl State {
    /// Whether `batch` waiting on a flight of `owner` would close a cycle
    fn closes_cycle(&self, mut owner: BatchId, batch: BatchId) -> bool {
        loop {
            if owner == batch {
                return true;
            }
            match self.waiting.get(&owner) {
                Some(flight) => owner = flight.batch,
                None => return false,
            }
        }
    }
}

enum Claim {
    Ready(Arc<Package>),
    /// Claimed earlier by the asking batch: a cycle, or a package the batch
    /// already decoded
    Own(Arc<Package>),
    Owner(Arc<InFlight>),
    Wait(Arc<InFlight>),
    /// Waiting would deadlock
    Cycle(Arc<InFlight>),
}

/// Thread-safe import cache
///
/// Behaves like [`Registry`](crate::Registry) and additionally guarantees
/// that a path is decoded by one thread at a time and published at most
/// once. The type arena is shared behind a read-write lock; linking a
/// package takes it exclusively.
#[derive(Debug)]
pub struct SyncRegistry<S = FsSource> {
    source: S,
    config: ImportConfig,
    state: Mutex<State>,
    types: RwLock<TypeArena>,
    next_batch: AtomicU64,
    hits: AtomicUsize,
    decodes: AtomicUsize,
}

impl Default for SyncRegistry<FsSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncRegistry<FsSource> {
    /// Create a registry reading artifacts from the file system
    pub fn new() -> Self {
        Self::with_config(ImportConfig::default())
    }

    /// Create a file-system registry with the given configuration
    pub fn with_config(config: ImportConfig) -> Self {
        Self::with_source(FsSource::new(&config), config)
    }
}

impl<S: ArtifactSource> SyncRegistry<S> {
    /// Create a registry reading artifacts from `source`
    pub fn with_source(source: S, config: ImportConfig) -> Self {
        let mut state = State::default();
        let unsafe_pkg = Arc::new(Package::unsafe_package());
        state
            .entries
            .insert(unsafe_pkg.path_arc().clone(), Entry::Ready(unsafe_pkg));
        Self {
            source,
            config,
            state: Mutex::new(state),
            types: RwLock::new(TypeArena::new()),
            next_batch: AtomicU64::new(0),
            hits: AtomicUsize::new(0),
            decodes: AtomicUsize::new(0),
        }
    }

    /// Import the package at `path` as seen from `src_dir`, waiting for
    /// decodes of it or its dependencies running on other threads
    pub fn import(
        &self,
        path: &str,
        src_dir: impl AsRef<Path>,
    ) -> Result<Arc<Package>, ImportError> {
        let src_dir = src_dir.as_ref();
        loop {
            let mut batch = Batch::new(self);
            let result = self.resolve(&mut batch, path, src_dir);
            if let Some(blocker) = batch.blocker.take() {
                batch.finish(Outcome::Abandoned);
                tracing::debug!(
                    path,
                    blocker = blocker.package.path(),
                    "import abandoned to break a cycle across threads"
                );
                blocker.wait();
                continue;
            }
            match &result {
                Ok(_) => batch.finish(Outcome::Published),
                Err(err) => {
                    tracing::debug!(path, error = %err, "import failed");
                    batch.finish(Outcome::Failed(err.clone()));
                }
            }
            return result;
        }
    }

    fn resolve(
        &self,
        batch: &mut Batch<'_, S>,
        path: &str,
        src_dir: &Path,
    ) -> Result<Arc<Package>, ImportError> {
        let id = package_id(path, src_dir);
        loop {
            let flight = match self.claim(&id, batch.id) {
                Claim::Ready(package) | Claim::Own(package) => return Ok(package),
                Claim::Owner(flight) => {
                    batch.flights.push(flight.clone());
                    self.decode(batch, path, &flight.package, src_dir)?;
                    return Ok(flight.package.clone());
                }
                Claim::Cycle(flight) => {
                    batch.blocker = Some(flight);
                    return Err(ImportError::Abandoned { path: id });
                }
                Claim::Wait(flight) => flight,
            };

            tracing::trace!(path = %id, "waiting for decode on another thread");
            match flight.wait() {
                Outcome::Published => return Ok(flight.package.clone()),
                Outcome::Failed(err) => return Err(err),
                Outcome::Abandoned => continue,
            }
        }
    }

    fn claim(&self, id: &str, batch: BatchId) -> Claim {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.entries.get(id) {
            Some(Entry::Ready(package)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(path = id, "registry hit");
                Claim::Ready(package.clone())
            }
            Some(Entry::InFlight(flight)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(path = id, "registry hit on package being decoded");
                if flight.batch == batch {
                    Claim::Own(flight.package.clone())
                } else if state.closes_cycle(flight.batch, batch) {
                    Claim::Cycle(flight.clone())
                } else {
                    state.waiting.insert(batch, flight.clone());
                    Claim::Wait(flight.clone())
                }
            }
            None => {
                let key: Arc<str> = Arc::from(id);
                let package = Arc::new(Package::placeholder(key.clone()));
                let flight = Arc::new(InFlight::new(package, batch));
                state.entries.insert(key, Entry::InFlight(flight.clone()));
                Claim::Owner(flight)
            }
        }
    }

    fn decode(
        &self,
        batch: &mut Batch<'_, S>,
        path: &str,
        package: &Arc<Package>,
        src_dir: &Path,
    ) -> Result<(), ImportError> {
        let req = ArtifactRequest {
            path,
            id: package.path(),
            src_dir,
        };
        let bytes = self.source.fetch(&req)?;
        self.decodes.fetch_add(1, Ordering::Relaxed);
        let options = DecodeOptions {
            allow_legacy_text: self.config.allow_legacy_text,
            max_type_depth: self.config.max_type_depth,
        };
        importer::load(batch, package, &bytes, src_dir, options)
    }

    /// The package registered under `id`; a package still being decoded is
    /// returned as its incomplete placeholder
    pub fn get(&self, id: &str) -> Option<Arc<Package>> {
        match self.state.lock().entries.get(id)? {
            Entry::Ready(package) => Some(package.clone()),
            Entry::InFlight(flight) => Some(flight.package.clone()),
        }
    }

    /// Number of packages held, `unsafe` and in-flight decodes included
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the registry holds no packages (never true: `unsafe` is
    /// always present)
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Published packages, in no particular order
    pub fn packages(&self) -> Vec<Arc<Package>> {
        self.state
            .lock()
            .entries
            .values()
            .filter_map(|entry| match entry {
                Entry::Ready(package) => Some(package.clone()),
                Entry::InFlight(_) => None,
            })
            .collect()
    }

    /// Read access to the session type arena
    pub fn types(&self) -> RwLockReadGuard<'_, TypeArena> {
        self.types.read()
    }

    /// Cache statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
        }
    }

    /// The artifact source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The configuration
    pub fn config(&self) -> &ImportConfig {
        &self.config
    }
}

/// The packages one top-level import claimed on the calling thread
struct Batch<'r, S: ArtifactSource> {
    registry: &'r SyncRegistry<S>,
    id: BatchId,
    flights: Vec<Arc<InFlight>>,
    /// Set when a lookup would have deadlocked on this flight
    blocker: Option<Arc<InFlight>>,
}

impl<'r, S: ArtifactSource> Batch<'r, S> {
    fn new(registry: &'r SyncRegistry<S>) -> Self {
        Self {
            registry,
            id: registry.next_batch.fetch_add(1, Ordering::Relaxed),
            flights: Vec::new(),
            blocker: None,
        }
    }

    /// Publish or discard every claimed package, then wake their waiters
    fn finish(&mut self, outcome: Outcome) {
        let flights = std::mem::take(&mut self.flights);
        let ids: Vec<Arc<str>> = flights
            .iter()
            .map(|f| f.package.path_arc().clone())
            .collect();
        let published = matches!(outcome, Outcome::Published);
        if !published {
            // before the entries go, so a new claim never sees stale types
            self.registry.types.write().forget_packages(&ids);
        }
        {
            let mut state = self.registry.state.lock();
            for (id, flight) in ids.into_iter().zip(&flights) {
                if published {
                    state.entries.insert(id, Entry::Ready(flight.package.clone()));
                } else {
                    state.entries.remove(&id);
                }
            }
            state.waiting.retain(|_, flight| flight.batch != self.id);
            state.waiting.remove(&self.id);
        }
        for flight in &flights {
            flight.settle(outcome.clone());
        }
    }
}

impl<S: ArtifactSource> Drop for Batch<'_, S> {
    fn drop(&mut self) {
        // only reached with claims left when decoding panicked
        if !self.flights.is_empty() {
            self.finish(Outcome::Abandoned);
        }
    }
}

impl<S: ArtifactSource> Resolve for Batch<'_, S> {
    fn resolve_dependency(
        &mut self,
        path: &str,
        src_dir: &Path,
    ) -> Result<Arc<Package>, ImportError> {
        let registry = self.registry;
        registry.resolve(self, path, src_dir)
    }

    fn link<R>(&mut self, f: impl FnOnce(&mut TypeArena) -> R) -> R {
        f(&mut self.registry.types.write())
    }
}
