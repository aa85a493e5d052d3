//! HTTP-backed address sources for quickhn.
//!
//! Responsibilities:
//! - Implement [`quickhn_core::SourceAdapter`] for the provider families in
//!   use: GeoJSON point services, ArcGIS REST feature services and
//!   plain-text line feeds.
//! - Map provider attribute names and status vocabularies onto
//!   [`quickhn_core::Feature`].
//! - Describe sources in a serialisable form so deployments can list them in
//!   a file.
//!
//! Boundaries:
//! - Caching, merging and eviction live in `quickhn-core`. Adapters answer
//!   one bounding box at a time and never retry.
//! - All requests go through the [`Transport`] seam.

mod definition;
mod esri;
mod geojson;
mod http;
mod lines;
mod mapping;
mod template;
mod transport;

#[doc(hidden)]
pub mod test_support;

pub use definition::{
    CoverageDefinition, EsriDefinition, GeoJsonDefinition, LinesDefinition, SourceDefinition,
    SourceDefinitionError, build_sources, parse_sources,
};
pub use esri::{DEFAULT_PAGE_SIZE, EsriSource};
pub use geojson::GeoJsonSource;
pub use http::{BuildSourceError, DEFAULT_USER_AGENT, HttpSourceConfig, HttpTransport};
pub use lines::LineSource;
pub use mapping::{FieldMapping, StatusVocabulary};
pub use template::{BboxTemplate, TemplateError, pad};
pub use transport::Transport;
