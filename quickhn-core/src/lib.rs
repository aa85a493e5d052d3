//! Core of the quickhn house-number index.
//!
//! Address points are pulled from several geographically bounded providers,
//! cached per grid cell, merged and deduplicated for whatever extent the
//! caller is looking at. Cells far from the current view are culled to keep
//! memory bounded.
//!
//! The main entry point is [`AddressIndex`]. Concrete HTTP adapters live in
//! the `quickhn-data` crate; this crate only defines the [`SourceAdapter`]
//! seam they implement.

#![forbid(unsafe_code)]

mod cache;
mod config;
mod directory;
mod eviction;
mod extent;
mod feature;
mod grid;
mod index;
mod source;

#[doc(hidden)]
pub mod test_support;

pub use cache::{CellCache, CellFeatures, CellStatus, EvictedCell};
pub use config::{CacheConfig, DEFAULT_CELL_VISIT_CEILING, DEFAULT_CULL_DISTANCE_M};
pub use directory::Directory;
pub use eviction::{CullReport, EvictionManager, RemovalListener};
pub use extent::{Aggregator, ExtentResult, dedup_by_address};
pub use feature::{AddressStatus, Feature, FeatureId, FeatureKey};
pub use grid::{CellIndex, CellRange, DEFAULT_LAT_SCALE, DEFAULT_LON_SCALE, Grid, GridError};
pub use index::{AddressIndex, AddressIndexBuilder};
pub use source::{Coverage, SourceAdapter, SourceError};
