//! Entry point bundling the cache, extent queries, eviction and lookup.

use std::sync::Arc;

use geo::{Coord, Rect};

use crate::{
    Aggregator, CacheConfig, CellCache, CullReport, EvictionManager, ExtentResult, Feature,
    FeatureId, FeatureKey, RemovalListener, SourceAdapter,
};

/// Multi-source house-number index for a moving viewport.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use geo::{Coord, Rect};
/// use quickhn_core::test_support::StubSource;
/// use quickhn_core::{AddressIndex, Coverage, Feature};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coverage = Coverage::from_rect(Rect::new(
///     Coord { x: 4.0, y: 50.0 },
///     Coord { x: 5.0, y: 51.0 },
/// ));
/// let source = StubSource::with_features(
///     "demo",
///     coverage,
///     vec![Feature::new(1_u64, Coord { x: 4.4, y: 50.85 }, "Grote Markt", "1")],
/// );
/// let index = AddressIndex::builder().source(Arc::new(source)).build();
///
/// let extent = Rect::new(Coord { x: 4.395, y: 50.845 }, Coord { x: 4.405, y: 50.855 });
/// let result = index.extent(extent).await;
/// assert_eq!(result.features.len(), 1);
/// assert!(index.lookup(&1_u64.into()).is_some());
/// # }
/// ```
#[derive(Debug)]
pub struct AddressIndex {
    cache: CellCache,
    aggregator: Aggregator,
    eviction: EvictionManager,
}

impl AddressIndex {
    /// Start configuring an index.
    #[must_use]
    pub fn builder() -> AddressIndexBuilder {
        AddressIndexBuilder::default()
    }

    /// Deduplicated features inside `bbox`.
    pub async fn extent(&self, bbox: Rect<f64>) -> ExtentResult {
        self.aggregator.get_extent_data(bbox).await
    }

    /// Cull around `center` if the view moved far enough since the last cull.
    pub fn view_moved(&self, center: Coord<f64>) -> Option<CullReport> {
        self.eviction.view_moved(center)
    }

    /// Cull around `reference` unconditionally.
    pub fn cull(&self, reference: Coord<f64>) -> CullReport {
        self.eviction.cull(reference)
    }

    /// Look up a cached feature by id.
    #[must_use]
    pub fn lookup(&self, id: &FeatureId) -> Option<Feature> {
        self.cache.lookup(id)
    }

    /// Look up the copy of a feature held for one particular source.
    #[must_use]
    pub fn lookup_key(&self, key: &FeatureKey) -> Option<Feature> {
        self.cache.lookup_key(key)
    }

    /// Underlying cell cache, for diagnostics.
    #[must_use]
    pub const fn cache(&self) -> &CellCache {
        &self.cache
    }
}

/// Builder for [`AddressIndex`].
#[derive(Default)]
pub struct AddressIndexBuilder {
    config: CacheConfig,
    sources: Vec<Arc<dyn SourceAdapter>>,
    listener: Option<Arc<dyn RemovalListener>>,
}

impl std::fmt::Debug for AddressIndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sources: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("AddressIndexBuilder")
            .field("config", &self.config)
            .field("sources", &sources)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl AddressIndexBuilder {
    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a source. Sources are merged in registration order.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn SourceAdapter>) -> Self {
        self.sources.push(source);
        self
    }

    /// Register several sources at once.
    #[must_use]
    pub fn sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn SourceAdapter>>,
    {
        self.sources.extend(sources);
        self
    }

    /// Notify `listener` of features removed by culls.
    #[must_use]
    pub fn removal_listener(mut self, listener: Arc<dyn RemovalListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Assemble the index.
    #[must_use]
    pub fn build(self) -> AddressIndex {
        let cache = CellCache::new(&self.config, self.sources);
        let aggregator = Aggregator::new(cache.clone(), self.config.cell_visit_ceiling);
        let manager = EvictionManager::new(cache.clone(), self.config.cull_distance_m);
        let eviction = match self.listener {
            Some(listener) => manager.with_listener(listener),
            None => manager,
        };
        AddressIndex {
            cache,
            aggregator,
            eviction,
        }
    }
}
