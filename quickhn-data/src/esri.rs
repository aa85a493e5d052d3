//! Adapter for ArcGIS REST feature services.
//!
//! The `query` operation caps the number of records per response, so one
//! bounding box may take several requests. Pages are requested with
//! `resultOffset` and `resultRecordCount` and concatenated into a single
//! fetch result.

use std::sync::Arc;

use async_trait::async_trait;
use geo::{Coord, Rect};
use log::{debug, warn};
use quickhn_core::{Coverage, Feature, SourceAdapter, SourceError};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::{FieldMapping, StatusVocabulary, Transport};

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 1_000;

/// Upper bound on pages requested for one bounding box.
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    features: Vec<EsriFeature>,
    #[serde(default)]
    exceeded_transfer_limit: Option<bool>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct EsriFeature {
    #[serde(default)]
    attributes: Map<String, Value>,
    #[serde(default)]
    geometry: Option<EsriPoint>,
}

#[derive(Debug, Deserialize)]
struct EsriPoint {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// ArcGIS REST `query` endpoint provider.
pub struct EsriSource {
    name: String,
    coverage: Coverage,
    endpoint: Url,
    mapping: FieldMapping,
    vocabulary: StatusVocabulary,
    page_size: usize,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for EsriSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsriSource")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl EsriSource {
    /// Create an adapter for the layer `query` endpoint at `endpoint`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        coverage: Coverage,
        endpoint: Url,
        mapping: FieldMapping,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            coverage,
            endpoint,
            mapping,
            vocabulary: StatusVocabulary::default(),
            page_size: DEFAULT_PAGE_SIZE,
            transport,
        }
    }

    /// Use a provider-specific status vocabulary.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: StatusVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Request `page_size` records per page. Zero is treated as one.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn page_url(&self, bbox: &Rect<f64>, offset: usize) -> Url {
        let Coord { x: left, y: bottom } = bbox.min();
        let Coord { x: right, y: top } = bbox.max();
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("f", "json")
            .append_pair("where", "1=1")
            .append_pair("geometry", &format!("{left},{bottom},{right},{top}"))
            .append_pair("geometryType", "esriGeometryEnvelope")
            .append_pair("inSR", "4326")
            .append_pair("outSR", "4326")
            .append_pair("spatialRel", "esriSpatialRelIntersects")
            .append_pair("outFields", "*")
            .append_pair("returnGeometry", "true")
            .append_pair("resultOffset", &offset.to_string())
            .append_pair("resultRecordCount", &self.page_size.to_string());
        url
    }

    fn parse_page(&self, body: &str, url: &str) -> Result<QueryResponse, SourceError> {
        let page: QueryResponse =
            serde_json::from_str(body).map_err(|err| SourceError::UpstreamFormat {
                url: url.to_owned(),
                message: err.to_string(),
            })?;
        if let Some(error) = page.error {
            return Err(SourceError::UpstreamFormat {
                url: url.to_owned(),
                message: format!("service error {}: {}", error.code, error.message),
            });
        }
        Ok(page)
    }

    fn convert(&self, feature: EsriFeature) -> Option<Feature> {
        let point = feature.geometry?;
        self.mapping.to_feature(
            &feature.attributes,
            Coord {
                x: point.x,
                y: point.y,
            },
            &self.vocabulary,
        )
    }
}

/// Whether another page should be requested after one with `received`
/// records.
///
/// An explicit `exceededTransferLimit: false` ends the query, as does a
/// short page unless the service reports that more records are available.
fn has_more(received: usize, page_size: usize, exceeded: Option<bool>) -> bool {
    match exceeded {
        Some(false) => false,
        Some(true) => received > 0,
        None => received >= page_size,
    }
}

#[async_trait]
impl SourceAdapter for EsriSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    async fn fetch(&self, bbox: Rect<f64>) -> Result<Vec<Feature>, SourceError> {
        let mut features = Vec::new();
        let mut offset = 0;
        for page_number in 1..=MAX_PAGES {
            let url = self.page_url(&bbox, offset);
            let body = self.transport.get_text(url.as_str()).await?;
            let page = self.parse_page(&body, url.as_str())?;
            let received = page.features.len();
            let more = has_more(received, self.page_size, page.exceeded_transfer_limit);
            features.extend(page.features.into_iter().filter_map(|f| self.convert(f)));
            debug!(
                "{}: page {page_number} at offset {offset} returned {received} records",
                self.name
            );
            if !more {
                return Ok(features);
            }
            offset += received;
        }
        warn!(
            "{}: stopped paging after {MAX_PAGES} pages at offset {offset}",
            self.name
        );
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubTransport;
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn wallonia() -> Coverage {
        Coverage::from_rect(Rect::new(
            Coord { x: 2.8, y: 49.4 },
            Coord { x: 6.4, y: 50.9 },
        ))
    }

    fn cell() -> Rect<f64> {
        Rect::new(Coord { x: 4.86, y: 50.46 }, Coord { x: 4.87, y: 50.47 })
    }

    fn page(start: u64, count: u64, exceeded: Option<bool>) -> String {
        let features: Vec<Value> = (start..start + count)
            .map(|id| {
                json!({
                    "attributes": {
                        "OBJECTID": id,
                        "RUE": "Rue de Fer",
                        "NUMERO": id.to_string()
                    },
                    "geometry": { "x": 4.865, "y": 50.465 }
                })
            })
            .collect();
        let mut body = json!({ "features": features });
        if let Some(flag) = exceeded {
            body["exceededTransferLimit"] = json!(flag);
        }
        body.to_string()
    }

    #[fixture]
    fn transport() -> Arc<StubTransport> {
        Arc::new(StubTransport::new())
    }

    fn source(transport: Arc<StubTransport>) -> EsriSource {
        let endpoint = Url::parse("https://gis.example/arcgis/rest/services/Adresses/MapServer/0/query")
            .expect("valid endpoint");
        EsriSource::new(
            "icar",
            wallonia(),
            endpoint,
            FieldMapping::new("OBJECTID", "RUE", "NUMERO"),
            transport,
        )
    }

    #[rstest]
    #[tokio::test]
    async fn follows_pages_until_a_short_page(transport: Arc<StubTransport>) {
        transport.push_body(page(0, 1_000, None));
        transport.push_body(page(1_000, 400, None));

        let features = source(transport.clone())
            .fetch(cell())
            .await
            .expect("two pages");

        assert_eq!(features.len(), 1_400);
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.first().is_some_and(|url| url.contains("resultOffset=0")));
        assert!(requests.get(1).is_some_and(|url| url.contains("resultOffset=1000")));
        assert!(requests.iter().all(|url| url.contains("resultRecordCount=1000")));
    }

    #[rstest]
    #[tokio::test]
    async fn transfer_limit_false_ends_a_full_page(transport: Arc<StubTransport>) {
        transport.push_body(page(0, 2, Some(false)));

        let features = source(transport.clone())
            .with_page_size(2)
            .fetch(cell())
            .await
            .expect("single page");

        assert_eq!(features.len(), 2);
        assert_eq!(transport.requests().len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn transfer_limit_true_continues_after_a_short_page(transport: Arc<StubTransport>) {
        transport.push_body(page(0, 500, Some(true)));
        transport.push_body(page(500, 20, Some(false)));

        let features = source(transport.clone())
            .fetch(cell())
            .await
            .expect("server-capped pages");

        assert_eq!(features.len(), 520);
        assert!(
            transport
                .requests()
                .get(1)
                .is_some_and(|url| url.contains("resultOffset=500"))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn service_error_bodies_are_format_errors(transport: Arc<StubTransport>) {
        transport.push_body(
            json!({ "error": { "code": 400, "message": "Invalid query parameters" } }).to_string(),
        );

        let err = source(transport).fetch(cell()).await.expect_err("service error");

        match err {
            SourceError::UpstreamFormat { message, .. } => {
                assert!(message.contains("Invalid query parameters"));
            }
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn a_failing_second_page_fails_the_fetch(transport: Arc<StubTransport>) {
        transport.push_body(page(0, 1_000, None));
        transport.push_error(SourceError::Network {
            url: "https://gis.example".into(),
            message: "connection reset".into(),
        });

        let err = source(transport).fetch(cell()).await.expect_err("second page fails");

        assert!(err.is_network());
    }

    #[rstest]
    #[case(1_000, 1_000, None, true)]
    #[case(999, 1_000, None, false)]
    #[case(0, 1_000, Some(true), false)]
    #[case(1_000, 1_000, Some(false), false)]
    fn paging_stops_on_short_pages_or_explicit_limit(
        #[case] received: usize,
        #[case] page_size: usize,
        #[case] exceeded: Option<bool>,
        #[case] expected: bool,
    ) {
        assert_eq!(has_more(received, page_size, exceeded), expected);
    }
}
