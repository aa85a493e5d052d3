//! Distance-based culling of cached cells.
//!
//! The display collaborator reports where the view is centred. Cells whose
//! reference corner lies farther than the cull distance from that point are
//! evicted together with their directory entries, and the registered
//! [`RemovalListener`] learns which features disappeared.

use std::sync::{Arc, Mutex, PoisonError};

use geo::{Coord, Distance, Haversine, Point};
use log::info;

use crate::{CellCache, CellIndex, FeatureKey};

/// Receives the source-qualified keys of features removed by a cull.
///
/// Implementations are typically the display layer, which drops the
/// corresponding markers.
///
/// # Examples
///
/// ```
/// use std::sync::Mutex;
/// use quickhn_core::{FeatureKey, RemovalListener};
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<FeatureKey>>);
///
/// impl RemovalListener for Recorder {
///     fn features_removed(&self, keys: &[FeatureKey]) {
///         if let Ok(mut seen) = self.0.lock() {
///             seen.extend_from_slice(keys);
///         }
///     }
/// }
///
/// let recorder = Recorder::default();
/// recorder.features_removed(&[FeatureKey::new("icar", 4_u64)]);
/// ```
pub trait RemovalListener: Send + Sync {
    /// Called once per cull that removed at least one feature.
    fn features_removed(&self, keys: &[FeatureKey]);
}

/// Outcome of a cull.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CullReport {
    /// Cells evicted, in ascending index order.
    pub evicted_cells: Vec<CellIndex>,
    /// Features no longer reachable through the directory, one key per
    /// source that lost its copy.
    pub removed_features: Vec<FeatureKey>,
}

impl CullReport {
    /// Whether the cull evicted nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.evicted_cells.is_empty()
    }
}

/// Culls cells far from a reference point.
pub struct EvictionManager {
    cache: CellCache,
    cull_distance_m: f64,
    listener: Option<Arc<dyn RemovalListener>>,
    last_cull: Mutex<Option<Coord<f64>>>,
}

impl std::fmt::Debug for EvictionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionManager")
            .field("cull_distance_m", &self.cull_distance_m)
            .field("has_listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl EvictionManager {
    /// Manage eviction for `cache`.
    #[must_use]
    pub const fn new(cache: CellCache, cull_distance_m: f64) -> Self {
        Self {
            cache,
            cull_distance_m,
            listener: None,
            last_cull: Mutex::new(None),
        }
    }

    /// Notify `listener` whenever a cull removes features.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RemovalListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Distance in metres beyond which cells are evicted.
    #[must_use]
    pub const fn cull_distance_m(&self) -> f64 {
        self.cull_distance_m
    }

    /// Evict every resolved cell farther than the cull distance from
    /// `reference`.
    ///
    /// Cells with a fetch in flight are left alone.
    pub fn cull(&self, reference: Coord<f64>) -> CullReport {
        let grid = *self.cache.grid();
        let evicted = self.cache.evict_where(|index| {
            haversine_m(grid.to_coord(index), reference) > self.cull_distance_m
        });
        *self
            .last_cull
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(reference);

        let mut report = CullReport::default();
        for cell in evicted {
            report.evicted_cells.push(cell.index);
            report.removed_features.extend(cell.removed);
        }
        if !report.is_empty() {
            info!(
                "culled {} cells and {} features around ({}, {})",
                report.evicted_cells.len(),
                report.removed_features.len(),
                reference.x,
                reference.y
            );
        }
        if let Some(listener) = &self.listener
            && !report.removed_features.is_empty()
        {
            listener.features_removed(&report.removed_features);
        }
        report
    }

    /// React to the view being centred on `center`.
    ///
    /// Culls on the first call and afterwards only once the centre has moved
    /// farther than the cull distance from where the previous cull ran.
    pub fn view_moved(&self, center: Coord<f64>) -> Option<CullReport> {
        let previous = *self
            .last_cull
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match previous {
            Some(last) if haversine_m(last, center) <= self.cull_distance_m => None,
            _ => Some(self.cull(center)),
        }
    }
}

/// Great-circle distance between two WGS84 coordinates in metres.
pub(crate) fn haversine_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b))
}
