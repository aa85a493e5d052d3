//! Serialisable descriptions of address sources.
//!
//! A sources file lists every provider the index should consult:
//!
//! ```json
//! {
//!   "sources": [
//!     {
//!       "kind": "geojson",
//!       "name": "crab",
//!       "coverage": { "bbox": [2.5, 50.7, 5.9, 51.5] },
//!       "url_template": "https://geo.example/wfs?bbox={left},{bottom},{right},{top}",
//!       "fields": { "id": "ADRESID", "street": "STRAATNM", "number": "HUISNR" }
//!     }
//!   ]
//! }
//! ```
//!
//! Definitions are turned into adapters with [`build_sources`]. Order in the
//! file is registration order, which decides which duplicate survives
//! deduplication.

use std::collections::HashSet;
use std::sync::Arc;

use geo::{Coord, Rect};
use quickhn_core::{Coverage, SourceAdapter};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::esri::DEFAULT_PAGE_SIZE;
use crate::{
    BboxTemplate, EsriSource, FieldMapping, GeoJsonSource, LineSource, StatusVocabulary,
    TemplateError, Transport,
};

/// Errors raised while reading or validating source definitions.
#[derive(Debug, Error)]
pub enum SourceDefinitionError {
    /// The sources document is not valid JSON for this schema.
    #[error("invalid sources document: {0}")]
    Parse(#[from] serde_json::Error),
    /// A coverage area is degenerate or contains non-finite coordinates.
    #[error("source {name}: invalid coverage: {reason}")]
    InvalidCoverage {
        /// Source name.
        name: String,
        /// What is wrong with the coverage.
        reason: String,
    },
    /// A URL template lacks a placeholder.
    #[error("source {name}: {source}")]
    Template {
        /// Source name.
        name: String,
        /// Underlying template error.
        #[source]
        source: TemplateError,
    },
    /// An endpoint is not a valid URL.
    #[error("source {name}: invalid endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        /// Source name.
        name: String,
        /// Offending endpoint.
        endpoint: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// Two sources share a name.
    #[error("duplicate source name {0}")]
    DuplicateName(String),
}

/// Area a source is authoritative for, as written in a sources file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoverageDefinition {
    /// `[left, bottom, right, top]` in degrees.
    Bbox {
        /// Corners of the box.
        bbox: [f64; 4],
    },
    /// Exterior ring of `[lon, lat]` pairs.
    Ring {
        /// Ring vertices; closed automatically.
        ring: Vec<[f64; 2]>,
    },
}

impl CoverageDefinition {
    fn to_coverage(&self, name: &str) -> Result<Coverage, SourceDefinitionError> {
        let invalid = |reason: &str| SourceDefinitionError::InvalidCoverage {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };
        match self {
            Self::Bbox {
                bbox: [left, bottom, right, top],
            } => {
                if ![left, bottom, right, top].iter().all(|v| v.is_finite()) {
                    return Err(invalid("bbox contains non-finite values"));
                }
                if left >= right || bottom >= top {
                    return Err(invalid("bbox must be ordered left, bottom, right, top"));
                }
                Ok(Coverage::from_rect(Rect::new(
                    Coord { x: *left, y: *bottom },
                    Coord { x: *right, y: *top },
                )))
            }
            Self::Ring { ring } => {
                if ring.len() < 3 {
                    return Err(invalid("ring needs at least three vertices"));
                }
                if !ring.iter().flatten().all(|v| v.is_finite()) {
                    return Err(invalid("ring contains non-finite values"));
                }
                let points: Vec<(f64, f64)> = ring.iter().map(|&[x, y]| (x, y)).collect();
                Ok(Coverage::from_ring(&points))
            }
        }
    }
}

/// GeoJSON point provider definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonDefinition {
    /// Source name, unique within a sources file.
    pub name: String,
    /// Authoritative area.
    pub coverage: CoverageDefinition,
    /// Request URL with bounding-box placeholders.
    pub url_template: String,
    /// Property names holding feature attributes.
    pub fields: FieldMapping,
    /// Status terms; the built-in vocabulary when absent.
    #[serde(default)]
    pub statuses: Option<StatusVocabulary>,
}

/// ArcGIS REST provider definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsriDefinition {
    /// Source name, unique within a sources file.
    pub name: String,
    /// Authoritative area.
    pub coverage: CoverageDefinition,
    /// Layer `query` endpoint.
    pub endpoint: String,
    /// Attribute names holding feature attributes.
    pub fields: FieldMapping,
    /// Status terms; the built-in vocabulary when absent.
    #[serde(default)]
    pub statuses: Option<StatusVocabulary>,
    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

const fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Plain-text line feed definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinesDefinition {
    /// Source name, unique within a sources file.
    pub name: String,
    /// Authoritative area.
    pub coverage: CoverageDefinition,
    /// Request URL with bounding-box placeholders.
    pub url_template: String,
    /// Margin in degrees added around every query box.
    #[serde(default)]
    pub padding_deg: f64,
}

/// Any supported source, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDefinition {
    /// GeoJSON `FeatureCollection` provider.
    #[serde(rename = "geojson")]
    GeoJson(GeoJsonDefinition),
    /// ArcGIS REST feature service.
    Esri(EsriDefinition),
    /// Plain-text line feed.
    Lines(LinesDefinition),
}

impl SourceDefinition {
    /// Name of the described source.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::GeoJson(def) => &def.name,
            Self::Esri(def) => &def.name,
            Self::Lines(def) => &def.name,
        }
    }

    /// Build the adapter, sending requests through `transport`.
    ///
    /// # Errors
    ///
    /// Returns an error when the coverage, URL template or endpoint is
    /// invalid.
    pub fn build(
        &self,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<dyn SourceAdapter>, SourceDefinitionError> {
        let name = self.name();
        let template_error = |source| SourceDefinitionError::Template {
            name: name.to_owned(),
            source,
        };
        match self {
            Self::GeoJson(def) => {
                let template = BboxTemplate::parse(def.url_template.as_str()).map_err(template_error)?;
                let source = GeoJsonSource::new(
                    name,
                    def.coverage.to_coverage(name)?,
                    template,
                    def.fields.clone(),
                    transport,
                )
                .with_vocabulary(def.statuses.clone().unwrap_or_default());
                Ok(Arc::new(source))
            }
            Self::Esri(def) => {
                let endpoint = Url::parse(&def.endpoint).map_err(|source| {
                    SourceDefinitionError::InvalidEndpoint {
                        name: name.to_owned(),
                        endpoint: def.endpoint.clone(),
                        source,
                    }
                })?;
                let source = EsriSource::new(
                    name,
                    def.coverage.to_coverage(name)?,
                    endpoint,
                    def.fields.clone(),
                    transport,
                )
                .with_vocabulary(def.statuses.clone().unwrap_or_default())
                .with_page_size(def.page_size);
                Ok(Arc::new(source))
            }
            Self::Lines(def) => {
                let template = BboxTemplate::parse(def.url_template.as_str()).map_err(template_error)?;
                let source = LineSource::new(name, def.coverage.to_coverage(name)?, template, transport)
                    .with_padding(def.padding_deg);
                Ok(Arc::new(source))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourcesDocument {
    sources: Vec<SourceDefinition>,
}

/// Parse a sources document.
///
/// # Errors
///
/// Returns [`SourceDefinitionError::Parse`] when the document does not match
/// the schema.
pub fn parse_sources(document: &str) -> Result<Vec<SourceDefinition>, SourceDefinitionError> {
    let parsed: SourcesDocument = serde_json::from_str(document)?;
    Ok(parsed.sources)
}

/// Build adapters for `definitions`, preserving their order.
///
/// # Errors
///
/// Returns the first invalid definition's error, or
/// [`SourceDefinitionError::DuplicateName`] when two sources share a name.
pub fn build_sources(
    definitions: &[SourceDefinition],
    transport: &Arc<dyn Transport>,
) -> Result<Vec<Arc<dyn SourceAdapter>>, SourceDefinitionError> {
    let mut names = HashSet::new();
    definitions
        .iter()
        .map(|definition| {
            if !names.insert(definition.name()) {
                return Err(SourceDefinitionError::DuplicateName(
                    definition.name().to_owned(),
                ));
            }
            definition.build(Arc::clone(transport))
        })
        .collect()
}
