//! Facade crate for the quickhn house-number cache.
//!
//! This crate re-exports the core cache types and exposes the HTTP-backed
//! source adapters behind the `http-sources` feature flag.

#![forbid(unsafe_code)]

pub use quickhn_core::{
    AddressIndex, AddressIndexBuilder, AddressStatus, CacheConfig, CellIndex, Coverage,
    CullReport, ExtentResult, Feature, FeatureId, FeatureKey, Grid, RemovalListener,
    SourceAdapter, SourceError,
};

#[cfg(feature = "http-sources")]
pub use quickhn_data::{
    EsriSource, GeoJsonSource, HttpSourceConfig, HttpTransport, LineSource, SourceDefinition,
    build_sources, parse_sources,
};
