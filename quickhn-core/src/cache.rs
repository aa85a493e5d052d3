//! Per-cell memoised store with request coalescing.
//!
//! Each cell moves through `Unfetched -> Fetching -> Resolved`. `Unfetched`
//! is the absence of an entry. The first caller for an unfetched cell spawns
//! a Tokio task that queries every applicable source and installs a shared
//! handle to that task; concurrent callers await the same handle instead of
//! issuing their own requests. The task records its result itself, so a
//! fetch whose callers have gone away still populates the cache.
//!
//! Adapter failures are absorbed here. A cell resolves with whatever the
//! successful adapters returned. When every consulted adapter failed, the
//! callers receive an empty list but nothing is cached, so the next request
//! retries the cell.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, join_all};
use geo::Rect;
use log::{debug, warn};

use crate::{
    CacheConfig, CellIndex, Directory, Feature, FeatureId, FeatureKey, Grid, SourceAdapter,
    SourceError,
};

/// Features held by one resolved cell, shared with every caller.
pub type CellFeatures = Arc<[Feature]>;

type PendingFetch = Shared<BoxFuture<'static, CellFeatures>>;

enum CellState {
    Fetching(PendingFetch),
    Resolved(CellFeatures),
}

/// Observable state of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    /// No entry exists; the next request fetches the cell.
    Unfetched,
    /// A fetch is in flight.
    Fetching,
    /// Features are cached until the cell is evicted.
    Resolved,
}

/// Cell removed by [`CellCache::evict_where`].
#[derive(Debug, Clone, PartialEq)]
pub struct EvictedCell {
    /// Address of the evicted cell.
    pub index: CellIndex,
    /// Features whose last owning cell was this one and which left the
    /// directory.
    pub removed: Vec<FeatureKey>,
}

#[derive(Default)]
struct CacheState {
    cells: HashMap<CellIndex, CellState>,
    directory: Directory,
}

/// Outcome of querying every applicable source for one cell.
#[derive(Debug, Default)]
struct CellFetch {
    features: Vec<Feature>,
    consulted: usize,
    failed: usize,
}

impl CellFetch {
    const fn all_failed(&self) -> bool {
        self.consulted > 0 && self.failed == self.consulted
    }
}

struct Inner {
    grid: Grid,
    sources: Vec<Arc<dyn SourceAdapter>>,
    adapter_timeout: Duration,
    state: Mutex<CacheState>,
}

/// Concurrent cache of per-cell feature lists.
///
/// Cloning is cheap and yields a handle to the same cache.
///
/// # Runtime
///
/// [`CellCache::get`] spawns fetch tasks and must therefore be awaited
/// within a Tokio runtime.
#[derive(Clone)]
pub struct CellCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CellCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.inner.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("CellCache")
            .field("grid", &self.inner.grid)
            .field("sources", &sources)
            .field("adapter_timeout", &self.inner.adapter_timeout)
            .field("cells", &self.len())
            .finish()
    }
}

impl CellCache {
    /// Build a cache over `sources`, which are consulted in the given order.
    #[must_use]
    pub fn new(config: &CacheConfig, sources: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                grid: config.grid,
                sources,
                adapter_timeout: config.adapter_timeout,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Grid used to address cells.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.inner.grid
    }

    /// Features of `index`, fetching them on first use.
    pub async fn get(&self, index: CellIndex) -> CellFeatures {
        let pending = {
            let mut state = self.inner.lock();
            match state.cells.get(&index) {
                Some(CellState::Resolved(features)) => {
                    debug!("cell ({}, {}) served from cache", index.x, index.y);
                    return Arc::clone(features);
                }
                Some(CellState::Fetching(pending)) => {
                    debug!("cell ({}, {}) joins in-flight fetch", index.x, index.y);
                    pending.clone()
                }
                None => {
                    let pending = self.start_fetch(index);
                    state
                        .cells
                        .insert(index, CellState::Fetching(pending.clone()));
                    pending
                }
            }
        };
        pending.await
    }

    fn start_fetch(&self, index: CellIndex) -> PendingFetch {
        debug!("cell ({}, {}) fetch started", index.x, index.y);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(Arc::clone(&inner).fetch_and_store(index));
        async move {
            match task.await {
                Ok(features) => features,
                Err(err) => {
                    warn!("fetch task for cell ({}, {}) aborted: {err}", index.x, index.y);
                    inner.forget_pending(index);
                    CellFeatures::from(Vec::new())
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Current state of `index`.
    #[must_use]
    pub fn status(&self, index: CellIndex) -> CellStatus {
        match self.inner.lock().cells.get(&index) {
            None => CellStatus::Unfetched,
            Some(CellState::Fetching(_)) => CellStatus::Fetching,
            Some(CellState::Resolved(_)) => CellStatus::Resolved,
        }
    }

    /// Indices of every cell with an entry, in ascending order.
    #[must_use]
    pub fn cached_cells(&self) -> Vec<CellIndex> {
        let mut cells: Vec<_> = self.inner.lock().cells.keys().copied().collect();
        cells.sort_unstable();
        cells
    }

    /// Number of cells with an entry, in flight or resolved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().cells.len()
    }

    /// Whether no cell has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a feature of any resolved cell by id.
    #[must_use]
    pub fn lookup(&self, id: &FeatureId) -> Option<Feature> {
        self.inner.lock().directory.lookup(id).cloned()
    }

    /// Look up the feature a specific source published under `key.id`.
    #[must_use]
    pub fn lookup_key(&self, key: &FeatureKey) -> Option<Feature> {
        self.inner.lock().directory.lookup_key(key).cloned()
    }

    /// Number of distinct features reachable through the directory.
    #[must_use]
    pub fn directory_len(&self) -> usize {
        self.inner.lock().directory.len()
    }

    /// Remove every resolved cell for which `should_evict` holds.
    ///
    /// Victims are collected before anything is removed, and removal of the
    /// cells and their directory entries happens under one lock. Cells with
    /// a fetch in flight are never evicted. Evicted cells are returned in
    /// ascending index order.
    pub fn evict_where<F>(&self, mut should_evict: F) -> Vec<EvictedCell>
    where
        F: FnMut(CellIndex) -> bool,
    {
        let mut state = self.inner.lock();
        let mut victims: Vec<CellIndex> = state
            .cells
            .iter()
            .filter(|(_, cell)| matches!(cell, CellState::Resolved(_)))
            .map(|(index, _)| *index)
            .filter(|index| should_evict(*index))
            .collect();
        victims.sort_unstable();

        let mut evicted = Vec::with_capacity(victims.len());
        for index in victims {
            let Some(CellState::Resolved(features)) = state.cells.remove(&index) else {
                continue;
            };
            let removed = state.directory.release(index, &features);
            evicted.push(EvictedCell { index, removed });
        }
        evicted
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_and_store(self: Arc<Self>, index: CellIndex) -> CellFeatures {
        let fetch = AssertUnwindSafe(self.fetch_cell(index))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                warn!("fetch for cell ({}, {}) panicked", index.x, index.y);
                CellFetch {
                    consulted: 1,
                    failed: 1,
                    ..CellFetch::default()
                }
            });
        self.store(index, fetch)
    }

    async fn fetch_cell(&self, index: CellIndex) -> CellFetch {
        let bbox = self.grid.cell_bounds(index);
        let applicable: Vec<&Arc<dyn SourceAdapter>> = self
            .sources
            .iter()
            .filter(|source| source.coverage().intersects(&bbox))
            .collect();
        let results = join_all(
            applicable
                .iter()
                .map(|source| self.fetch_source(source.as_ref(), bbox)),
        )
        .await;

        let mut fetch = CellFetch {
            consulted: applicable.len(),
            ..CellFetch::default()
        };
        for (source, result) in applicable.iter().zip(results) {
            match result {
                Ok(features) => {
                    debug!(
                        "source {} returned {} features for cell ({}, {})",
                        source.name(),
                        features.len(),
                        index.x,
                        index.y
                    );
                    fetch
                        .features
                        .extend(features.into_iter().map(|feature| stamp(feature, source.name())));
                }
                Err(err) => {
                    warn!(
                        "source {} failed for cell ({}, {}): {err}",
                        source.name(),
                        index.x,
                        index.y
                    );
                    fetch.failed += 1;
                }
            }
        }
        fetch
    }

    async fn fetch_source(
        &self,
        source: &dyn SourceAdapter,
        bbox: Rect<f64>,
    ) -> Result<Vec<Feature>, SourceError> {
        tokio::time::timeout(self.adapter_timeout, source.fetch(bbox))
            .await
            .unwrap_or_else(|_| {
                Err(SourceError::Timeout {
                    target: source.name().to_owned(),
                    timeout_secs: self.adapter_timeout.as_secs(),
                })
            })
    }

    fn store(&self, index: CellIndex, fetch: CellFetch) -> CellFeatures {
        let all_failed = fetch.all_failed();
        let features = CellFeatures::from(fetch.features);
        let mut state = self.lock();
        if all_failed {
            warn!(
                "every source failed for cell ({}, {}); leaving it unfetched",
                index.x, index.y
            );
            state.cells.remove(&index);
        } else {
            state.directory.register(index, &features);
            state
                .cells
                .insert(index, CellState::Resolved(Arc::clone(&features)));
        }
        features
    }

    fn forget_pending(&self, index: CellIndex) {
        let mut state = self.lock();
        if matches!(state.cells.get(&index), Some(CellState::Fetching(_))) {
            state.cells.remove(&index);
        }
    }
}

// Directory entries are keyed by the name of the adapter that fetched them.
fn stamp(mut feature: Feature, source: &str) -> Feature {
    source.clone_into(&mut feature.source);
    feature
}
