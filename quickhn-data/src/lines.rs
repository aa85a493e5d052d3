//! Adapter for plain-text house-number feeds.
//!
//! The body holds one record per line. Four comma-separated values describe a
//! house number as `lon,lat,number,street_key`; two values declare a street as
//! `street_key,street_name`. Street declarations may follow the numbers that
//! use them, so keys are resolved only after the whole body has been read.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use geo::{Coord, Rect};
use log::debug;
use quickhn_core::{Coverage, Feature, FeatureId, SourceAdapter, SourceError};

use crate::template::pad;
use crate::{BboxTemplate, Transport};

struct PendingNumber<'a> {
    location: Coord<f64>,
    number: &'a str,
    street_key: &'a str,
}

/// Line-oriented text provider.
pub struct LineSource {
    name: String,
    coverage: Coverage,
    template: BboxTemplate,
    padding_deg: f64,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for LineSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSource")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("padding_deg", &self.padding_deg)
            .finish_non_exhaustive()
    }
}

impl LineSource {
    /// Create an adapter querying `template` through `transport`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        coverage: Coverage,
        template: BboxTemplate,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            coverage,
            template,
            padding_deg: 0.0,
            transport,
        }
    }

    /// Pad every query box by `padding_deg` degrees on each side.
    #[must_use]
    pub const fn with_padding(mut self, padding_deg: f64) -> Self {
        self.padding_deg = padding_deg;
        self
    }

    /// Parse a response body into features.
    ///
    /// Ids are synthesised from the source name, street key and number since
    /// the feed carries none.
    #[must_use]
    pub fn parse_body(&self, body: &str) -> Vec<Feature> {
        let mut streets: HashMap<&str, &str> = HashMap::new();
        let mut pending = Vec::new();
        for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let values: Vec<&str> = line.split(',').map(str::trim).collect();
            match values.as_slice() {
                [lon, lat, number, street_key] => match (lon.parse::<f64>(), lat.parse::<f64>()) {
                    (Ok(x), Ok(y)) => pending.push(PendingNumber {
                        location: Coord { x, y },
                        number: *number,
                        street_key: *street_key,
                    }),
                    _ => debug!("{}: skipping line with bad coordinates: {line}", self.name),
                },
                [street_key, street_name] => {
                    streets.insert(*street_key, *street_name);
                }
                _ => debug!("{}: skipping unrecognised line: {line}", self.name),
            }
        }

        pending
            .into_iter()
            .filter(|entry| !entry.number.is_empty())
            .filter_map(|entry| {
                let Some(street) = streets.get(entry.street_key) else {
                    debug!(
                        "{}: dropping {} with unknown street key {}",
                        self.name, entry.number, entry.street_key
                    );
                    return None;
                };
                let id = FeatureId::Text(format!(
                    "{}:{}:{}",
                    self.name, entry.street_key, entry.number
                ));
                Some(Feature::new(id, entry.location, *street, entry.number))
            })
            .collect()
    }
}

#[async_trait]
impl SourceAdapter for LineSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    async fn fetch(&self, bbox: Rect<f64>) -> Result<Vec<Feature>, SourceError> {
        let url = self.template.render(&pad(&bbox, self.padding_deg));
        let body = self.transport.get_text(&url).await?;
        Ok(self.parse_body(&body))
    }
}
