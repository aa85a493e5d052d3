//! Normalised address features shared by every source.
//!
//! Each source adapter parses its provider's payload into [`Feature`] values.
//! Features are immutable once parsed; the cache hands out clones.

use std::fmt;

use geo::Coord;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a feature within a source's namespace.
///
/// Providers report either integer object ids or opaque string keys.
///
/// # Examples
/// ```
/// use quickhn_core::FeatureId;
///
/// assert_eq!(FeatureId::from(42_u64).to_string(), "42");
/// assert_eq!(FeatureId::from("crab-17").to_string(), "crab-17");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FeatureId {
    /// Integer identifier, e.g. an ESRI `OBJECTID`.
    Numeric(u64),
    /// String identifier, e.g. a persistent URI or namespaced key.
    Text(String),
}

impl FeatureId {
    /// Parse a raw identifier, preferring the numeric form when possible.
    ///
    /// # Examples
    /// ```
    /// use quickhn_core::FeatureId;
    ///
    /// assert_eq!(FeatureId::parse("17"), FeatureId::Numeric(17));
    /// assert_eq!(FeatureId::parse("17a"), FeatureId::Text("17a".into()));
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.parse::<u64>()
            .map_or_else(|_| Self::Text(raw.to_owned()), Self::Numeric)
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for FeatureId {
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// Lifecycle status reported for an address.
///
/// Some providers only ever publish active addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AddressStatus {
    /// The address is in use.
    #[default]
    Active,
    /// The address has been proposed but not yet assigned.
    Planned,
    /// The address has been retired.
    Archived,
}

/// One real-world address point.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use quickhn_core::{AddressStatus, Feature};
///
/// let feature = Feature::new(1_u64, Coord { x: 4.35, y: 50.85 }, "Grote Markt", "7")
///     .with_municipality("Brussel")
///     .with_source("urbis");
///
/// assert_eq!(feature.status, AddressStatus::Active);
/// assert_eq!(feature.address_key(), ("Grote Markt", "7"));
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Feature {
    /// Identifier, unique within the producing source's namespace.
    pub id: FeatureId,
    /// Point location.
    pub location: Coord<f64>,
    /// Street name as reported by the source.
    pub street: String,
    /// House number, possibly with a suffix such as `12A` or `3/1`.
    pub number: String,
    /// Municipality name; descriptive only and may be empty.
    pub municipality: String,
    /// Lifecycle status.
    pub status: AddressStatus,
    /// Name of the source adapter that produced the feature.
    pub source: String,
}

impl Feature {
    /// Construct an active feature with empty municipality and source.
    #[must_use]
    pub fn new(
        id: impl Into<FeatureId>,
        location: Coord<f64>,
        street: impl Into<String>,
        number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            location,
            street: street.into(),
            number: number.into(),
            municipality: String::new(),
            status: AddressStatus::Active,
            source: String::new(),
        }
    }

    /// Set the municipality.
    #[must_use]
    pub fn with_municipality(mut self, municipality: impl Into<String>) -> Self {
        self.municipality = municipality.into();
        self
    }

    /// Set the lifecycle status.
    #[must_use]
    pub const fn with_status(mut self, status: AddressStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the producing source name.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Composite `(street, number)` key used for cross-source deduplication.
    #[must_use]
    pub fn address_key(&self) -> (&str, &str) {
        (self.street.as_str(), self.number.as_str())
    }

    /// Source-qualified identity of the feature.
    #[must_use]
    pub fn key(&self) -> FeatureKey {
        FeatureKey::new(self.source.clone(), self.id.clone())
    }
}

/// Identity of a feature across every source.
///
/// Two providers may both publish object id `5`; the producing source name
/// keeps their entries apart.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use quickhn_core::{Feature, FeatureKey};
///
/// let feature = Feature::new(5_u64, Coord { x: 4.86, y: 50.46 }, "Rue de Fer", "5")
///     .with_source("icar");
/// assert_eq!(feature.key(), FeatureKey::new("icar", 5_u64));
/// assert_eq!(feature.key().to_string(), "icar/5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureKey {
    /// Name of the producing source.
    pub source: String,
    /// Identifier within that source's namespace.
    pub id: FeatureId,
}

impl FeatureKey {
    /// Build a key from a source name and an id.
    #[must_use]
    pub fn new(source: impl Into<String>, id: impl Into<FeatureId>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0", FeatureId::Numeric(0))]
    #[case("123456", FeatureId::Numeric(123_456))]
    #[case("-3", FeatureId::Text("-3".into()))]
    #[case("https://data.vlaanderen.be/id/adres/1", FeatureId::Text("https://data.vlaanderen.be/id/adres/1".into()))]
    fn parse_prefers_numeric_ids(#[case] raw: &str, #[case] expected: FeatureId) {
        assert_eq!(FeatureId::parse(raw), expected);
    }

    #[rstest]
    fn builder_sets_optional_fields() {
        let feature = Feature::new("a", Coord { x: 0.0, y: 0.0 }, "Kerkstraat", "1")
            .with_municipality("Gent")
            .with_status(AddressStatus::Planned)
            .with_source("crab");
        assert_eq!(feature.municipality, "Gent");
        assert_eq!(feature.status, AddressStatus::Planned);
        assert_eq!(feature.source, "crab");
    }
}
