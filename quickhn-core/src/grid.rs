//! Fixed-resolution grid used to partition the cache into cells.
//!
//! The grid is a linear scaling of longitude and latitude. The two axes have
//! independent scale factors because a cell is meant to correspond to a
//! roughly square query box on the ground, not a square in degrees.

use geo::{Coord, Rect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of cells per degree of longitude.
pub const DEFAULT_LON_SCALE: f64 = 100.0;

/// Default number of cells per degree of latitude.
pub const DEFAULT_LAT_SCALE: f64 = 150.0;

/// Tolerance, in cells, absorbing rounding error at cell boundaries.
const INDEX_EPSILON: f64 = 1.0e-9;

/// Integer address of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellIndex {
    /// Column, growing eastwards.
    pub x: i32,
    /// Row, growing northwards.
    pub y: i32,
}

impl CellIndex {
    /// Construct a cell index.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Linear grid over WGS84 coordinates.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use quickhn_core::{CellIndex, Grid};
///
/// let grid = Grid::default();
/// let index = grid.to_index(Coord { x: 4.3512, y: 50.8467 });
/// assert_eq!(index, CellIndex::new(435, 7627));
/// assert_eq!(grid.to_index(grid.to_coord(index)), index);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Grid {
    lon_scale: f64,
    lat_scale: f64,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            lon_scale: DEFAULT_LON_SCALE,
            lat_scale: DEFAULT_LAT_SCALE,
        }
    }
}

/// Errors returned by [`Grid::new`].
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GridError {
    /// A scale factor was zero, negative or not finite.
    #[error("grid scale must be a positive finite number, got {scale}")]
    InvalidScale {
        /// Offending scale factor.
        scale: f64,
    },
}

impl Grid {
    /// Build a grid with `lon_scale` cells per degree of longitude and
    /// `lat_scale` cells per degree of latitude.
    pub fn new(lon_scale: f64, lat_scale: f64) -> Result<Self, GridError> {
        for scale in [lon_scale, lat_scale] {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(GridError::InvalidScale { scale });
            }
        }
        Ok(Self {
            lon_scale,
            lat_scale,
        })
    }

    /// Cells per degree of longitude.
    #[must_use]
    pub const fn lon_scale(&self) -> f64 {
        self.lon_scale
    }

    /// Cells per degree of latitude.
    #[must_use]
    pub const fn lat_scale(&self) -> f64 {
        self.lat_scale
    }

    /// Cell containing `coord`.
    ///
    /// Points on a shared border belong to the cell to their east/north.
    #[must_use]
    pub fn to_index(&self, coord: Coord<f64>) -> CellIndex {
        CellIndex {
            x: scale_to_cell(coord.x, self.lon_scale),
            y: scale_to_cell(coord.y, self.lat_scale),
        }
    }

    /// South-west corner of `index`, the inverse of [`Grid::to_index`] at
    /// cell boundaries.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "grid coordinates are a linear scaling of cell indices"
    )]
    pub fn to_coord(&self, index: CellIndex) -> Coord<f64> {
        Coord {
            x: f64::from(index.x) / self.lon_scale,
            y: f64::from(index.y) / self.lat_scale,
        }
    }

    /// Bounding box covered by `index`.
    #[must_use]
    pub fn cell_bounds(&self, index: CellIndex) -> Rect<f64> {
        let min = self.to_coord(index);
        let max = self.to_coord(CellIndex::new(
            index.x.saturating_add(1),
            index.y.saturating_add(1),
        ));
        Rect::new(min, max)
    }

    /// Inclusive range of cells touched by `extent`.
    #[must_use]
    pub fn cells_covering(&self, extent: &Rect<f64>) -> CellRange {
        let min = self.to_index(extent.min());
        let max = self.to_index(extent.max());
        CellRange { min, max }
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "cell lookup scales degrees into grid units"
)]
#[expect(
    clippy::cast_possible_truncation,
    reason = "the value is floored and clamped to the i32 range first"
)]
fn scale_to_cell(value: f64, scale: f64) -> i32 {
    let scaled = (value * scale + INDEX_EPSILON).floor();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Inclusive rectangle of cell indices.
///
/// Iteration is deterministic: columns west to east, and within a column
/// rows south to north.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    /// South-west cell.
    pub min: CellIndex,
    /// North-east cell.
    pub max: CellIndex,
}

impl CellRange {
    /// Number of cells in the range.
    #[must_use]
    pub fn len(&self) -> u64 {
        span(self.min.x, self.max.x).saturating_mul(span(self.min.y, self.max.y))
    }

    /// Whether the range contains no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the cells in visiting order.
    pub fn iter(&self) -> impl Iterator<Item = CellIndex> + use<> {
        let CellRange { min, max } = *self;
        (min.x..=max.x).flat_map(move |x| (min.y..=max.y).map(move |y| CellIndex::new(x, y)))
    }
}

fn span(min: i32, max: i32) -> u64 {
    if max < min {
        return 0;
    }
    u64::from(max.abs_diff(min)).saturating_add(1)
}
