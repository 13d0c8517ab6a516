//! Population identifiers and the catalog of populations present in a dataset.

use crate::error::{AdmixError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// An opaque population identifier, e.g. `Iran_GanjDareh_N` or `Mbuti.DG`.
///
/// Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Population(String);

impl Population {
    /// Create a population identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Population {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Population {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Population {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Population {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// File layouts a catalog can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    /// EIGENSTRAT `.ind`: `sample sex population`, population in column 3.
    Ind,
    /// PLINK `.fam`: family ID (column 1) holds the population label.
    Fam,
    /// One population per line, `#` starts a comment.
    List,
}

impl CatalogFormat {
    /// Guess the format from a file extension. Anything unrecognised is a plain list.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ind") => CatalogFormat::Ind,
            Some("fam") => CatalogFormat::Fam,
            _ => CatalogFormat::List,
        }
    }
}

/// The set of populations actually present in a loaded dataset.
///
/// Built once after loading and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationCatalog {
    populations: BTreeSet<Population>,
}

impl PopulationCatalog {
    /// Build a catalog from any collection of identifiers.
    pub fn new<I, P>(populations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Population>,
    {
        Self {
            populations: populations.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a catalog from a file, choosing the layout from its extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::from_file_with_format(path, CatalogFormat::from_path(path))
    }

    /// Load a catalog from a file with an explicit layout.
    pub fn from_file_with_format<P: AsRef<Path>>(path: P, format: CatalogFormat) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let column = match format {
            CatalogFormat::Ind => 2,
            CatalogFormat::Fam | CatalogFormat::List => 0,
        };

        let mut populations = BTreeSet::new();
        for (line_no, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let name = match format {
                CatalogFormat::List => Some(line),
                _ => line.split_whitespace().nth(column),
            };
            match name {
                Some(name) => {
                    populations.insert(Population::from(name));
                }
                None => {
                    return Err(AdmixError::InvalidParameter(format!(
                        "{}: line {} has fewer than {} columns",
                        path.as_ref().display(),
                        line_no + 1,
                        column + 1
                    )))
                }
            }
        }

        if populations.is_empty() {
            return Err(AdmixError::EmptyData(format!(
                "no populations in {}",
                path.as_ref().display()
            )));
        }

        Ok(Self { populations })
    }

    /// Check whether a population is present.
    pub fn contains(&self, population: &str) -> bool {
        self.populations.contains(population)
    }

    /// Number of distinct populations.
    pub fn len(&self) -> usize {
        self.populations.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.populations.is_empty()
    }

    /// Iterate over populations in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Population> {
        self.populations.iter()
    }

    /// Return the requested populations that are absent, deduplicated, in request order.
    pub fn missing<'a, I>(&self, requested: I) -> Vec<Population>
    where
        I: IntoIterator<Item = &'a Population>,
    {
        let mut seen = BTreeSet::new();
        requested
            .into_iter()
            .filter(|p| !self.contains(p.as_str()))
            .filter(|p| seen.insert((*p).clone()))
            .cloned()
            .collect()
    }
}
