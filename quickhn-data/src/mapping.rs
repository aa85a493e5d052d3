//! Translation of provider attribute records into [`Feature`] values.

use std::collections::HashMap;

use geo::Coord;
use log::debug;
use quickhn_core::{AddressStatus, Feature, FeatureId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider field names holding each feature attribute.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use quickhn_data::{FieldMapping, StatusVocabulary};
/// use serde_json::json;
///
/// let mapping = FieldMapping::new("OBJECTID", "STRAATNM", "HUISNR");
/// let record = json!({ "OBJECTID": 12, "STRAATNM": "Kerkstraat", "HUISNR": "4A" });
/// let feature = mapping
///     .to_feature(record.as_object().unwrap(), Coord { x: 3.7, y: 51.0 }, &StatusVocabulary::default())
///     .unwrap();
/// assert_eq!(feature.number, "4A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field holding the identifier.
    pub id: String,
    /// Field holding the street name.
    pub street: String,
    /// Field holding the house number.
    pub number: String,
    /// Field holding the municipality name, if the provider has one.
    #[serde(default)]
    pub municipality: Option<String>,
    /// Field holding the lifecycle status, if the provider has one.
    #[serde(default)]
    pub status: Option<String>,
    /// Prefix prepended to every id to keep namespaces of different
    /// providers disjoint.
    #[serde(default)]
    pub id_prefix: Option<String>,
}

impl FieldMapping {
    /// Mapping for the three mandatory fields.
    #[must_use]
    pub fn new(id: impl Into<String>, street: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            street: street.into(),
            number: number.into(),
            municipality: None,
            status: None,
            id_prefix: None,
        }
    }

    /// Read the municipality from `field`.
    #[must_use]
    pub fn with_municipality(mut self, field: impl Into<String>) -> Self {
        self.municipality = Some(field.into());
        self
    }

    /// Read the lifecycle status from `field`.
    #[must_use]
    pub fn with_status(mut self, field: impl Into<String>) -> Self {
        self.status = Some(field.into());
        self
    }

    /// Prefix every id with `prefix`.
    #[must_use]
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Build a feature from one attribute record.
    ///
    /// Returns `None` when the id, street or number is missing, or when the
    /// status is present but not part of `vocabulary`. A record without a
    /// status field is treated as active.
    #[must_use]
    pub fn to_feature(
        &self,
        properties: &Map<String, Value>,
        location: Coord<f64>,
        vocabulary: &StatusVocabulary,
    ) -> Option<Feature> {
        let id = self.read_id(properties)?;
        let street = text_field(properties, &self.street)?;
        let number = text_field(properties, &self.number)?;
        let status = match self.status.as_deref().and_then(|field| text_field(properties, field)) {
            None => AddressStatus::Active,
            Some(raw) => {
                let Some(status) = vocabulary.resolve(&raw) else {
                    debug!("dropping {id}: unknown status {raw:?}");
                    return None;
                };
                status
            }
        };
        let municipality = self
            .municipality
            .as_deref()
            .and_then(|field| text_field(properties, field))
            .unwrap_or_default();

        Some(
            Feature::new(id, location, street, number)
                .with_municipality(municipality)
                .with_status(status),
        )
    }

    fn read_id(&self, properties: &Map<String, Value>) -> Option<FeatureId> {
        let raw = properties.get(&self.id)?;
        match (&self.id_prefix, raw) {
            (None, Value::Number(number)) => number.as_u64().map(FeatureId::Numeric),
            (None, Value::String(text)) if !text.is_empty() => Some(FeatureId::parse(text)),
            (Some(prefix), _) => {
                text_value(raw).map(|text| FeatureId::Text(format!("{prefix}{text}")))
            }
            _ => None,
        }
    }
}

/// Case-insensitive table from provider status strings to
/// [`AddressStatus`].
///
/// The default vocabulary knows the common English terms. Providers using
/// other terms describe them in their source definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, AddressStatus>", into = "HashMap<String, AddressStatus>")]
pub struct StatusVocabulary {
    terms: HashMap<String, AddressStatus>,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        [
            ("active", AddressStatus::Active),
            ("current", AddressStatus::Active),
            ("in use", AddressStatus::Active),
            ("planned", AddressStatus::Planned),
            ("proposed", AddressStatus::Planned),
            ("reserved", AddressStatus::Planned),
            ("archived", AddressStatus::Archived),
            ("retired", AddressStatus::Archived),
            ("historic", AddressStatus::Archived),
        ]
        .into_iter()
        .collect()
    }
}

impl<S: AsRef<str>> FromIterator<(S, AddressStatus)> for StatusVocabulary {
    fn from_iter<I: IntoIterator<Item = (S, AddressStatus)>>(iter: I) -> Self {
        Self {
            terms: iter
                .into_iter()
                .map(|(term, status)| (normalise(term.as_ref()), status))
                .collect(),
        }
    }
}

impl From<HashMap<String, AddressStatus>> for StatusVocabulary {
    fn from(terms: HashMap<String, AddressStatus>) -> Self {
        terms.into_iter().collect()
    }
}

impl From<StatusVocabulary> for HashMap<String, AddressStatus> {
    fn from(vocabulary: StatusVocabulary) -> Self {
        vocabulary.terms
    }
}

impl StatusVocabulary {
    /// Status named by `raw`, if known.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<AddressStatus> {
        self.terms.get(&normalise(raw)).copied()
    }
}

fn normalise(term: &str) -> String {
    term.trim().to_lowercase()
}

fn text_field(properties: &Map<String, Value>, field: &str) -> Option<String> {
    properties.get(field).and_then(text_value)
}

/// Render scalar JSON values as text; blanks count as missing.
fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn mapping() -> FieldMapping {
        FieldMapping::new("id", "street", "number")
            .with_municipality("town")
            .with_status("state")
    }

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    fn origin() -> Coord<f64> {
        Coord { x: 0.0, y: 0.0 }
    }

    #[rstest]
    fn maps_every_field(mapping: FieldMapping) {
        let record = props(json!({
            "id": 7, "street": "Kerkstraat", "number": 12, "town": "Gent", "state": "Planned"
        }));
        let feature = mapping
            .to_feature(&record, origin(), &StatusVocabulary::default())
            .expect("complete record");
        assert_eq!(feature.id, FeatureId::Numeric(7));
        assert_eq!(feature.number, "12");
        assert_eq!(feature.municipality, "Gent");
        assert_eq!(feature.status, AddressStatus::Planned);
    }

    #[rstest]
    fn missing_status_means_active(mapping: FieldMapping) {
        let record = props(json!({ "id": "a1", "street": "Kerkstraat", "number": "1" }));
        let feature = mapping
            .to_feature(&record, origin(), &StatusVocabulary::default())
            .expect("status is optional");
        assert_eq!(feature.status, AddressStatus::Active);
        assert_eq!(feature.id, FeatureId::Text("a1".into()));
    }

    #[rstest]
    fn unknown_status_drops_the_record(mapping: FieldMapping) {
        let record = props(json!({
            "id": 1, "street": "Kerkstraat", "number": "1", "state": "demolished"
        }));
        assert!(mapping
            .to_feature(&record, origin(), &StatusVocabulary::default())
            .is_none());
    }

    #[rstest]
    #[case(json!({ "street": "Kerkstraat", "number": "1" }))]
    #[case(json!({ "id": 1, "number": "1" }))]
    #[case(json!({ "id": 1, "street": "Kerkstraat", "number": "  " }))]
    fn incomplete_records_are_dropped(mapping: FieldMapping, #[case] record: Value) {
        assert!(mapping
            .to_feature(&props(record), origin(), &StatusVocabulary::default())
            .is_none());
    }

    #[rstest]
    fn prefixed_ids_are_textual() {
        let mapping = FieldMapping::new("id", "street", "number").with_id_prefix("crab:");
        let record = props(json!({ "id": 42, "street": "Kerkstraat", "number": "1" }));
        let feature = mapping
            .to_feature(&record, origin(), &StatusVocabulary::default())
            .expect("complete record");
        assert_eq!(feature.id, FeatureId::Text("crab:42".into()));
    }

    #[rstest]
    #[case("ACTIVE", Some(AddressStatus::Active))]
    #[case(" Retired ", Some(AddressStatus::Archived))]
    #[case("inGebruik", None)]
    fn vocabulary_is_case_insensitive(#[case] raw: &str, #[case] expected: Option<AddressStatus>) {
        assert_eq!(StatusVocabulary::default().resolve(raw), expected);
    }

    #[rstest]
    fn vocabulary_deserialises_from_a_map() {
        let vocabulary: StatusVocabulary = serde_json::from_value(json!({
            "InGebruik": "active",
            "Voorgesteld": "planned"
        }))
        .expect("valid vocabulary");
        assert_eq!(vocabulary.resolve("ingebruik"), Some(AddressStatus::Active));
        assert_eq!(vocabulary.resolve("active"), None);
    }
}
