//! Fixed fallbacks for populations that are sometimes absent from a dataset.

use crate::data::{Population, PopulationCatalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static mapping from a population that may be missing to its preferred fallback.
///
/// Only consulted for populations already found missing from the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubstitutionTable {
    fallbacks: BTreeMap<Population, Population>,
}

impl SubstitutionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fallback for `missing`, replacing any previous entry.
    pub fn insert(&mut self, missing: impl Into<Population>, fallback: impl Into<Population>) {
        self.fallbacks.insert(missing.into(), fallback.into());
    }

    /// Builder-style `insert`.
    pub fn with(mut self, missing: impl Into<Population>, fallback: impl Into<Population>) -> Self {
        self.insert(missing, fallback);
        self
    }

    /// The configured fallback, whether or not it is available.
    pub fn fallback(&self, missing: &str) -> Option<&Population> {
        self.fallbacks.get(missing)
    }

    /// The fallback for `missing` if it is present in `catalog`.
    pub fn resolve(&self, missing: &str, catalog: &PopulationCatalog) -> Option<&Population> {
        self.fallback(missing)
            .filter(|fallback| catalog.contains(fallback.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.fallbacks.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.fallbacks.is_empty()
    }

    /// Iterate over `(missing, fallback)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Population, &Population)> {
        self.fallbacks.iter()
    }
}

impl<K: Into<Population>, V: Into<Population>> FromIterator<(K, V)> for SubstitutionTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fallbacks: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_requires_fallback_in_catalog() {
        let table = SubstitutionTable::new()
            .with("Iran_GanjDareh_N", "Iran_N")
            .with("Turan_ChL", "Geoksiur_EN");
        let catalog = PopulationCatalog::new(["Iran_N", "Mbuti.DG"]);

        assert_eq!(
            table.resolve("Iran_GanjDareh_N", &catalog),
            Some(&Population::from("Iran_N"))
        );
        assert_eq!(table.resolve("Turan_ChL", &catalog), None);
        assert_eq!(table.resolve("Mbuti.DG", &catalog), None);
        assert_eq!(
            table.fallback("Turan_ChL"),
            Some(&Population::from("Geoksiur_EN"))
        );
    }

    #[test]
    fn test_deserialize_from_yaml_map() {
        let table: SubstitutionTable =
            serde_yaml::from_str("Steppe_MLBA: Sintashta_MLBA\nAASI: Onge.DG\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.fallback("AASI"), Some(&Population::from("Onge.DG")));
    }
}
