//! Tuning knobs for the cell cache and its eviction manager.
//!
//! [`CacheConfig`] bundles the grid, the per-extent cell visit ceiling, the
//! adapter timeout and the cull distance, with builder-style overrides.

use std::time::Duration;

use crate::Grid;

/// Default ceiling on the number of cells a single extent query may visit.
pub const DEFAULT_CELL_VISIT_CEILING: usize = 10;

/// Default distance, in metres, beyond which cached cells are culled.
pub const DEFAULT_CULL_DISTANCE_M: f64 = 1_000.0;

/// Default per-adapter timeout in seconds.
const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 15;

/// Runtime configuration for an [`crate::AddressIndex`] and its parts.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use quickhn_core::CacheConfig;
///
/// let config = CacheConfig::default()
///     .with_cell_visit_ceiling(4)
///     .with_adapter_timeout(Duration::from_secs(5));
/// assert_eq!(config.cell_visit_ceiling, 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Grid partitioning the cache into cells.
    pub grid: Grid,
    /// Maximum number of cells visited by one extent query.
    pub cell_visit_ceiling: usize,
    /// Cells whose reference corner lies farther than this from the view
    /// centre are evicted by a cull.
    pub cull_distance_m: f64,
    /// Upper bound on a single adapter call.
    pub adapter_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            cell_visit_ceiling: DEFAULT_CELL_VISIT_CEILING,
            cull_distance_m: DEFAULT_CULL_DISTANCE_M,
            adapter_timeout: Duration::from_secs(DEFAULT_ADAPTER_TIMEOUT_SECS),
        }
    }
}

impl CacheConfig {
    /// Use a custom grid.
    #[must_use]
    pub const fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = grid;
        self
    }

    /// Set the cell-visit ceiling.
    #[must_use]
    pub const fn with_cell_visit_ceiling(mut self, ceiling: usize) -> Self {
        self.cell_visit_ceiling = ceiling;
        self
    }

    /// Set the cull distance in metres.
    #[must_use]
    pub const fn with_cull_distance_m(mut self, distance: f64) -> Self {
        self.cull_distance_m = distance;
        self
    }

    /// Set the per-adapter timeout.
    #[must_use]
    pub const fn with_adapter_timeout(mut self, timeout: Duration) -> Self {
        self.adapter_timeout = timeout;
        self
    }
}
