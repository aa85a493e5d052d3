//! Source adapters wrap one external address provider each.
//!
//! An adapter declares the polygon within which its data is authoritative
//! and fetches normalised [`Feature`] values for a bounding box. The cell
//! cache checks the coverage before every call, so adapters never see boxes
//! that lie entirely outside their polygon.

use async_trait::async_trait;
use geo::{Coord, Intersects, LineString, MultiPolygon, Polygon, Rect};
use thiserror::Error;

use crate::Feature;

/// Errors reported by [`SourceAdapter::fetch`].
///
/// These never escape the cell cache: a failing adapter contributes no
/// features and the failure is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// Transport-level failure reaching the provider.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Request URL.
        url: String,
        /// Transport error description.
        message: String,
    },
    /// No answer arrived within the configured timeout.
    #[error("{target} timed out after {timeout_secs}s")]
    Timeout {
        /// Adapter name or request URL that timed out.
        target: String,
        /// Timeout that elapsed, in whole seconds.
        timeout_secs: u64,
    },
    /// The provider answered with an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    HttpStatus {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
    },
    /// The response body did not match the provider's expected schema.
    #[error("unexpected response format from {url}: {message}")]
    UpstreamFormat {
        /// Request URL.
        url: String,
        /// Parser error description.
        message: String,
    },
}

impl SourceError {
    /// Whether the error stems from reaching the provider rather than from
    /// parsing its answer.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. }
        )
    }
}

/// Geographic area within which a source is authoritative.
///
/// # Examples
/// ```
/// use geo::{Coord, Rect};
/// use quickhn_core::Coverage;
///
/// let flanders = Coverage::from_rect(Rect::new(
///     Coord { x: 2.5, y: 50.7 },
///     Coord { x: 5.9, y: 51.5 },
/// ));
/// let ghent = Rect::new(Coord { x: 3.7, y: 51.0 }, Coord { x: 3.8, y: 51.1 });
/// let namur = Rect::new(Coord { x: 4.8, y: 50.4 }, Coord { x: 4.9, y: 50.5 });
/// assert!(flanders.intersects(&ghent));
/// assert!(!flanders.intersects(&namur));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    area: MultiPolygon<f64>,
}

impl Coverage {
    /// Coverage described by a single polygon.
    #[must_use]
    pub fn from_polygon(polygon: Polygon<f64>) -> Self {
        Self {
            area: MultiPolygon::new(vec![polygon]),
        }
    }

    /// Coverage made of several disjoint polygons.
    #[must_use]
    pub const fn from_multi_polygon(area: MultiPolygon<f64>) -> Self {
        Self { area }
    }

    /// Coverage described by an axis-aligned rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self::from_polygon(rect.to_polygon())
    }

    /// Coverage described by an exterior ring of `(lon, lat)` pairs.
    ///
    /// The ring is closed automatically.
    #[must_use]
    pub fn from_ring(ring: &[(f64, f64)]) -> Self {
        let exterior: LineString<f64> = ring
            .iter()
            .map(|&(x, y)| Coord { x, y })
            .collect::<Vec<_>>()
            .into();
        Self::from_polygon(Polygon::new(exterior, Vec::new()))
    }

    /// Whether `bbox` touches the covered area.
    #[must_use]
    pub fn intersects(&self, bbox: &Rect<f64>) -> bool {
        self.area.intersects(bbox)
    }

    /// Underlying geometry.
    #[must_use]
    pub const fn area(&self) -> &MultiPolygon<f64> {
        &self.area
    }
}

/// One external address provider.
///
/// Implementations must be `Send + Sync` because cell fetches run on spawned
/// Tokio tasks.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use geo::{Coord, Rect};
/// use quickhn_core::{Coverage, Feature, SourceAdapter, SourceError};
///
/// struct Fixed {
///     coverage: Coverage,
/// }
///
/// #[async_trait]
/// impl SourceAdapter for Fixed {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     fn coverage(&self) -> &Coverage {
///         &self.coverage
///     }
///
///     async fn fetch(&self, _bbox: Rect<f64>) -> Result<Vec<Feature>, SourceError> {
///         Ok(vec![Feature::new(1_u64, Coord { x: 0.5, y: 0.5 }, "Main Street", "1")])
///     }
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs and stamped on produced features.
    fn name(&self) -> &str;

    /// Area in which the source has data.
    fn coverage(&self) -> &Coverage;

    /// Fetch every feature within `bbox`.
    ///
    /// Returns an empty list when the provider has nothing there.
    async fn fetch(&self, bbox: Rect<f64>) -> Result<Vec<Feature>, SourceError>;
}
