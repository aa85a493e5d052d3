//! Adapter for providers answering bounding-box queries with a GeoJSON
//! `FeatureCollection` of points, such as WFS services with
//! `outputFormat=application/json`.

use std::sync::Arc;

use async_trait::async_trait;
use geo::{Coord, Rect};
use log::debug;
use quickhn_core::{Coverage, Feature, SourceAdapter, SourceError};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{BboxTemplate, FieldMapping, StatusVocabulary, Transport};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    geometry: Option<Geometry>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

impl Geometry {
    fn point(&self) -> Option<Coord<f64>> {
        if self.kind != "Point" {
            return None;
        }
        let coordinates = self.coordinates.as_array()?;
        let x = coordinates.first()?.as_f64()?;
        let y = coordinates.get(1)?.as_f64()?;
        Some(Coord { x, y })
    }
}

/// GeoJSON point provider.
pub struct GeoJsonSource {
    name: String,
    coverage: Coverage,
    template: BboxTemplate,
    mapping: FieldMapping,
    vocabulary: StatusVocabulary,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for GeoJsonSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoJsonSource")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

impl GeoJsonSource {
    /// Create an adapter querying `template` through `transport`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        coverage: Coverage,
        template: BboxTemplate,
        mapping: FieldMapping,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            coverage,
            template,
            mapping,
            vocabulary: StatusVocabulary::default(),
            transport,
        }
    }

    /// Use a provider-specific status vocabulary.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: StatusVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    fn parse(&self, body: &str, url: &str) -> Result<Vec<Feature>, SourceError> {
        let collection: FeatureCollection =
            serde_json::from_str(body).map_err(|err| SourceError::UpstreamFormat {
                url: url.to_owned(),
                message: err.to_string(),
            })?;
        let total = collection.features.len();
        let features: Vec<Feature> = collection
            .features
            .into_iter()
            .filter_map(|feature| self.convert(feature))
            .collect();
        if features.len() < total {
            debug!(
                "{}: kept {} of {} features from {url}",
                self.name,
                features.len(),
                total
            );
        }
        Ok(features)
    }

    fn convert(&self, feature: GeoJsonFeature) -> Option<Feature> {
        let location = feature.geometry.as_ref().and_then(Geometry::point)?;
        let mut properties = feature.properties.unwrap_or_default();
        if let Some(id) = feature.id
            && !properties.contains_key(&self.mapping.id)
        {
            properties.insert(self.mapping.id.clone(), id);
        }
        self.mapping
            .to_feature(&properties, location, &self.vocabulary)
    }
}

#[async_trait]
impl SourceAdapter for GeoJsonSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    async fn fetch(&self, bbox: Rect<f64>) -> Result<Vec<Feature>, SourceError> {
        let url = self.template.render(&bbox);
        let body = self.transport.get_text(&url).await?;
        self.parse(&body, &url)
    }
}
