//! Extent queries spanning several cells.
//!
//! An extent is mapped onto the grid, its cells are fetched one after the
//! other in grid order, and the concatenated features are deduplicated by
//! address. A cell-visit ceiling bounds the work done for very large extents.

use std::collections::HashSet;

use geo::Rect;
use log::{debug, warn};

use crate::{CellCache, Feature};

/// Features returned for one extent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtentResult {
    /// Deduplicated features in cell-visiting order.
    pub features: Vec<Feature>,
    /// Set when the extent covered more cells than the ceiling allows and
    /// `features` is therefore partial.
    pub ceiling_exceeded: bool,
    /// Number of cells visited to produce the result.
    pub cells_visited: usize,
}

/// Maps extents to cells and merges their features.
#[derive(Debug, Clone)]
pub struct Aggregator {
    cache: CellCache,
    cell_visit_ceiling: usize,
}

impl Aggregator {
    /// Build an aggregator over `cache`.
    #[must_use]
    pub const fn new(cache: CellCache, cell_visit_ceiling: usize) -> Self {
        Self {
            cache,
            cell_visit_ceiling,
        }
    }

    /// Maximum number of cells a single query visits.
    #[must_use]
    pub const fn cell_visit_ceiling(&self) -> usize {
        self.cell_visit_ceiling
    }

    /// Features for `extent`.
    ///
    /// Cells are awaited sequentially. When the extent needs more cells than
    /// the ceiling, the query stops after the ceiling is reached and flags
    /// the result as partial.
    pub async fn get_extent_data(&self, extent: Rect<f64>) -> ExtentResult {
        let range = self.cache.grid().cells_covering(&extent);
        let mut result = ExtentResult::default();
        let mut collected = Vec::new();

        for index in range.iter() {
            if result.cells_visited >= self.cell_visit_ceiling {
                warn!(
                    "extent needs {} cells, stopping at the ceiling of {}",
                    range.len(),
                    self.cell_visit_ceiling
                );
                result.ceiling_exceeded = true;
                break;
            }
            let features = self.cache.get(index).await;
            collected.extend(features.iter().cloned());
            result.cells_visited += 1;
        }

        result.features = dedup_by_address(collected);
        debug!(
            "extent resolved to {} features from {} cells",
            result.features.len(),
            result.cells_visited
        );
        result
    }
}

/// Keep the first feature of every `(street, number)` pair.
///
/// This collapses the same address reported by overlapping sources or
/// neighbouring cells. It also merges distinct addresses that happen to share
/// a street name and number, since geometry is not compared.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use quickhn_core::{Feature, dedup_by_address};
///
/// let here = Coord { x: 0.0, y: 0.0 };
/// let features = vec![
///     Feature::new(1_u64, here, "Kerkstraat", "1").with_source("a"),
///     Feature::new(2_u64, here, "Kerkstraat", "1").with_source("b"),
///     Feature::new(3_u64, here, "Kerkstraat", "1A"),
/// ];
/// let unique = dedup_by_address(features);
/// assert_eq!(unique.len(), 2);
/// assert_eq!(unique[0].source, "a");
/// ```
#[must_use]
pub fn dedup_by_address(features: Vec<Feature>) -> Vec<Feature> {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(features.len());
    features
        .into_iter()
        .filter(|feature| seen.insert((feature.street.clone(), feature.number.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubSource, as_adapters};
    use crate::{CacheConfig, CellIndex, Coverage, Grid};
    use geo::Coord;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::sync::Arc;

    fn world() -> Coverage {
        Coverage::from_rect(Rect::new(
            Coord { x: -180.0, y: -90.0 },
            Coord { x: 180.0, y: 90.0 },
        ))
    }

    /// A unit grid keeps cell arithmetic obvious: cell `(x, y)` spans
    /// `[x, x + 1] x [y, y + 1]`.
    fn unit_config(ceiling: usize) -> CacheConfig {
        CacheConfig::default()
            .with_grid(Grid::new(1.0, 1.0).expect("valid grid"))
            .with_cell_visit_ceiling(ceiling)
    }

    fn at(id: u64, x: f64, y: f64, number: &str) -> Feature {
        Feature::new(id, Coord { x, y }, "Stationsstraat", number)
    }

    fn extent(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Rect<f64> {
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
    }

    #[rstest]
    #[tokio::test]
    async fn concatenates_cells_in_grid_order() {
        let stub = Arc::new(StubSource::with_features(
            "a",
            world(),
            vec![at(2, 1.5, 0.5, "2"), at(1, 0.5, 0.5, "1")],
        ));
        let cache = CellCache::new(&unit_config(10), as_adapters(&[stub]));
        let aggregator = Aggregator::new(cache, 10);

        let result = aggregator.get_extent_data(extent(0.2, 0.2, 1.8, 0.8)).await;

        let numbers: Vec<_> = result.features.iter().map(|f| f.number.as_str()).collect();
        assert_eq!(numbers, vec!["1", "2"]);
        assert_eq!(result.cells_visited, 2);
        assert!(!result.ceiling_exceeded);
    }

    #[rstest]
    #[tokio::test]
    async fn stops_at_the_cell_visit_ceiling() {
        let stub = Arc::new(StubSource::with_features("a", world(), Vec::new()));
        let cache = CellCache::new(&unit_config(3), as_adapters(&[stub.clone()]));
        let aggregator = Aggregator::new(cache.clone(), 3);

        let result = aggregator.get_extent_data(extent(0.5, 0.5, 4.5, 4.5)).await;

        assert!(result.ceiling_exceeded);
        assert_eq!(result.cells_visited, 3);
        assert_eq!(stub.calls(), 3);
        assert_eq!(
            cache.cached_cells(),
            vec![CellIndex::new(0, 0), CellIndex::new(0, 1), CellIndex::new(0, 2)]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn extent_exactly_at_ceiling_is_complete() {
        let stub = Arc::new(StubSource::with_features("a", world(), Vec::new()));
        let cache = CellCache::new(&unit_config(4), as_adapters(&[stub]));
        let aggregator = Aggregator::new(cache, 4);

        let result = aggregator.get_extent_data(extent(0.5, 0.5, 1.5, 1.5)).await;

        assert!(!result.ceiling_exceeded);
        assert_eq!(result.cells_visited, 4);
    }

    #[rstest]
    #[tokio::test]
    async fn border_features_reported_by_two_cells_appear_once() {
        let stub = Arc::new(StubSource::with_features(
            "a",
            world(),
            vec![at(1, 1.0, 0.5, "1")],
        ));
        let cache = CellCache::new(&unit_config(10), as_adapters(&[stub]));
        let aggregator = Aggregator::new(cache, 10);

        let result = aggregator.get_extent_data(extent(0.5, 0.2, 1.5, 0.8)).await;

        assert_eq!(result.features.len(), 1);
    }

    fn arb_feature() -> impl Strategy<Value = Feature> {
        (0_u64..50, "[A-C]", "[1-4]").prop_map(|(id, street, number)| {
            Feature::new(id, Coord { x: 0.0, y: 0.0 }, street, number)
        })
    }

    proptest! {
        #[test]
        fn dedup_is_idempotent(features in proptest::collection::vec(arb_feature(), 0..40)) {
            let once = dedup_by_address(features);
            let twice = dedup_by_address(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn dedup_keeps_first_occurrence(features in proptest::collection::vec(arb_feature(), 1..40)) {
            let first = features.first().cloned().expect("non-empty input");
            let unique = dedup_by_address(features);
            prop_assert_eq!(unique.first(), Some(&first));
        }
    }
}
