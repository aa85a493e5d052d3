//! Secondary index from feature identifier to feature.
//!
//! The directory spans every resolved cell. Entries are keyed by
//! [`FeatureKey`], so two sources publishing the same object id never share
//! an entry. A feature reported by more than one cell of the same source
//! (points on a shared border, or providers padding the query box) keeps its
//! entry until the last of those cells is evicted.

use std::collections::{BTreeSet, HashMap};

use crate::{CellIndex, Feature, FeatureId, FeatureKey};

#[derive(Debug, Clone)]
struct Entry {
    feature: Feature,
    owners: BTreeSet<CellIndex>,
}

/// Feature lookup table owned by the cell cache.
#[derive(Debug, Default)]
pub struct Directory {
    // Per id, one entry per source in registration order.
    entries: HashMap<FeatureId, Vec<Entry>>,
}

impl Directory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every feature of a freshly resolved cell.
    ///
    /// When the same source already reported an id from another cell, the
    /// first registered feature is kept and the cell is recorded as an
    /// additional owner.
    pub fn register(&mut self, cell: CellIndex, features: &[Feature]) {
        for feature in features {
            let sources = self.entries.entry(feature.id.clone()).or_default();
            if let Some(entry) = sources
                .iter_mut()
                .find(|entry| entry.feature.source == feature.source)
            {
                entry.owners.insert(cell);
            } else {
                sources.push(Entry {
                    feature: feature.clone(),
                    owners: BTreeSet::from([cell]),
                });
            }
        }
    }

    /// Drop `cell`'s claim on each of `features`.
    ///
    /// Returns the keys whose last owner was `cell` and which are therefore
    /// gone from the directory.
    pub fn release(&mut self, cell: CellIndex, features: &[Feature]) -> Vec<FeatureKey> {
        let mut removed = Vec::new();
        for feature in features {
            let Some(sources) = self.entries.get_mut(&feature.id) else {
                continue;
            };
            let Some(position) = sources
                .iter()
                .position(|entry| entry.feature.source == feature.source)
            else {
                continue;
            };
            let orphaned = sources.get_mut(position).is_some_and(|entry| {
                entry.owners.remove(&cell);
                entry.owners.is_empty()
            });
            if orphaned {
                sources.remove(position);
                removed.push(feature.key());
            }
            if sources.is_empty() {
                self.entries.remove(&feature.id);
            }
        }
        removed
    }

    /// Look up a feature by id.
    ///
    /// When several sources hold the id, the one registered first wins.
    #[must_use]
    pub fn lookup(&self, id: &FeatureId) -> Option<&Feature> {
        self.entries
            .get(id)
            .and_then(|sources| sources.first())
            .map(|entry| &entry.feature)
    }

    /// Look up the feature a specific source published under `key.id`.
    #[must_use]
    pub fn lookup_key(&self, key: &FeatureKey) -> Option<&Feature> {
        self.entries
            .get(&key.id)?
            .iter()
            .find(|entry| entry.feature.source == key.source)
            .map(|entry| &entry.feature)
    }

    /// Number of distinct features indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use rstest::{fixture, rstest};

    #[fixture]
    fn features() -> Vec<Feature> {
        vec![
            Feature::new(1_u64, Coord { x: 0.0, y: 0.0 }, "Kerkstraat", "1").with_source("crab"),
            Feature::new(2_u64, Coord { x: 0.0, y: 0.0 }, "Kerkstraat", "3").with_source("crab"),
        ]
    }

    #[rstest]
    fn lookup_finds_registered_features(features: Vec<Feature>) {
        let mut directory = Directory::new();
        directory.register(CellIndex::new(0, 0), &features);
        assert_eq!(directory.len(), 2);
        let found = directory.lookup(&FeatureId::Numeric(2)).expect("registered");
        assert_eq!(found.number, "3");
    }

    #[rstest]
    fn release_removes_features_of_single_owner(features: Vec<Feature>) {
        let mut directory = Directory::new();
        let cell = CellIndex::new(0, 0);
        directory.register(cell, &features);
        let removed = directory.release(cell, &features);
        assert_eq!(
            removed,
            vec![FeatureKey::new("crab", 1_u64), FeatureKey::new("crab", 2_u64)]
        );
        assert!(directory.is_empty());
        assert!(directory.lookup(&FeatureId::Numeric(1)).is_none());
    }

    #[rstest]
    fn shared_feature_survives_until_last_owner_released(features: Vec<Feature>) {
        let mut directory = Directory::new();
        let west = CellIndex::new(0, 0);
        let east = CellIndex::new(1, 0);
        let shared = features.get(..1).expect("one feature");
        directory.register(west, &features);
        directory.register(east, shared);

        let removed = directory.release(west, &features);
        assert_eq!(removed, vec![FeatureKey::new("crab", 2_u64)]);
        assert!(directory.lookup(&FeatureId::Numeric(1)).is_some());

        let removed_later = directory.release(east, shared);
        assert_eq!(removed_later, vec![FeatureKey::new("crab", 1_u64)]);
        assert!(directory.is_empty());
    }

    #[rstest]
    fn colliding_ids_from_different_sources_stay_apart() {
        let mut directory = Directory::new();
        let west_cell = CellIndex::new(0, 0);
        let east_cell = CellIndex::new(50, 0);
        let west = [Feature::new(5_u64, Coord { x: 0.5, y: 0.5 }, "Kerkstraat", "5")
            .with_source("west")];
        let east = [Feature::new(5_u64, Coord { x: 50.5, y: 0.5 }, "Rue de Fer", "5")
            .with_source("east")];
        directory.register(west_cell, &west);
        directory.register(east_cell, &east);

        assert_eq!(directory.len(), 2);
        assert_eq!(
            directory
                .lookup_key(&FeatureKey::new("east", 5_u64))
                .map(|f| f.street.as_str()),
            Some("Rue de Fer")
        );

        let removed = directory.release(west_cell, &west);

        assert_eq!(removed, vec![FeatureKey::new("west", 5_u64)]);
        assert!(directory.lookup_key(&FeatureKey::new("west", 5_u64)).is_none());
        let survivor = directory.lookup(&FeatureId::Numeric(5)).expect("east entry");
        assert_eq!(survivor.source, "east");
        assert_eq!(survivor.street, "Rue de Fer");
    }
}
