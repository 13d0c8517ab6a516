//! Dataset backed by previously exported qpAdm fits.
//!
//! Useful for re-ranking a finished batch offline and for tests. Fits are
//! read from a TSV with a header row:
//!
//! ```text
//! target  sources          outgroups            weights    std_errors   p_value  error
//! S1      Iran_N,AASI      Mbuti.DG,Han.DG      0.6,0.4    0.05,0.05    0.12
//! S1      Iran_N,Onge.DG   Mbuti.DG,Han.DG                              0.0      singular covariance
//! ```
//!
//! List columns are comma separated. A non-empty `error` column makes that
//! model fail with a solver error; an empty `std_errors` column models a
//! solver run that returned no standard errors. Lookup ignores the order of
//! sources and outgroups; weights come back in the caller's source order.

use crate::data::{Population, PopulationCatalog};
use crate::error::{AdmixError, Result};
use crate::solver::{Dataset, SolverOptions, SolverOutput};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// One recorded fit, or a recorded failure.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedFit {
    pub target: Population,
    pub sources: Vec<Population>,
    pub outgroups: Vec<Population>,
    pub outcome: std::result::Result<SolverOutput, String>,
}

#[derive(Debug, Deserialize)]
struct FitRow {
    target: String,
    sources: String,
    outgroups: String,
    #[serde(default)]
    weights: String,
    #[serde(default)]
    std_errors: String,
    #[serde(default)]
    p_value: Option<f64>,
    #[serde(default)]
    error: String,
}

/// Fits are keyed by target, the source set and the outgroup set.
type FitKey = (Population, BTreeSet<Population>, BTreeSet<Population>);

fn key(target: &Population, sources: &[Population], outgroups: &[Population]) -> FitKey {
    (
        target.clone(),
        sources.iter().cloned().collect(),
        outgroups.iter().cloned().collect(),
    )
}

/// A fit as recorded, with the source order its weights are listed in.
#[derive(Debug, Clone)]
struct RecordedFit {
    sources: Vec<Population>,
    outcome: std::result::Result<SolverOutput, String>,
}

impl RecordedFit {
    /// Reorder weights and standard errors to follow `sources`.
    ///
    /// Output whose lengths do not match the recorded sources is returned as
    /// is, leaving the count check to the runner.
    fn reordered(&self, output: &SolverOutput, sources: &[Population]) -> SolverOutput {
        let n = self.sources.len();
        let consistent = output.weights.len() == n
            && output.std_errors.as_ref().map_or(true, |se| se.len() == n);
        let order: Option<Vec<usize>> = sources
            .iter()
            .map(|p| self.sources.iter().position(|r| r == p))
            .collect();
        match order {
            Some(order) if consistent && order.len() == n => SolverOutput {
                weights: order.iter().map(|&i| output.weights[i]).collect(),
                std_errors: output
                    .std_errors
                    .as_ref()
                    .map(|se| order.iter().map(|&i| se[i]).collect()),
                p_value: output.p_value,
            },
            _ => output.clone(),
        }
    }
}

fn split_list(field: &str) -> Vec<Population> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Population::from)
        .collect()
}

fn parse_numbers(field: &str, column: &str, line: usize) -> Result<Vec<f64>> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|_| {
                AdmixError::InvalidParameter(format!(
                    "invalid number '{}' in column '{}' at line {}",
                    s, column, line
                ))
            })
        })
        .collect()
}

/// A dataset that answers `solve` from a table of recorded fits.
#[derive(Debug, Clone)]
pub struct PrecomputedDataset {
    catalog: PopulationCatalog,
    fits: HashMap<FitKey, RecordedFit>,
}

impl PrecomputedDataset {
    /// Build from a catalog and recorded fits. Later fits for the same model win.
    pub fn new(catalog: PopulationCatalog, fits: Vec<PrecomputedFit>) -> Self {
        let fits = fits
            .into_iter()
            .map(|f| {
                (
                    key(&f.target, &f.sources, &f.outgroups),
                    RecordedFit {
                        sources: f.sources,
                        outcome: f.outcome,
                    },
                )
            })
            .collect();
        Self { catalog, fits }
    }

    /// Load fits from TSV.
    ///
    /// Without an explicit catalog, every population named in the file is
    /// treated as present.
    pub fn from_tsv<P: AsRef<Path>>(path: P, catalog: Option<PopulationCatalog>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let mut fits = Vec::new();
        for (idx, row) in reader.deserialize::<FitRow>().enumerate() {
            let row = row?;
            let line = idx + 2;
            let outcome = if !row.error.is_empty() {
                Err(row.error.clone())
            } else {
                let p_value = row.p_value.ok_or_else(|| {
                    AdmixError::InvalidParameter(format!("missing p_value at line {}", line))
                })?;
                let std_errors = parse_numbers(&row.std_errors, "std_errors", line)?;
                Ok(SolverOutput {
                    weights: parse_numbers(&row.weights, "weights", line)?,
                    std_errors: (!std_errors.is_empty()).then_some(std_errors),
                    p_value,
                })
            };
            fits.push(PrecomputedFit {
                target: Population::from(row.target.as_str()),
                sources: split_list(&row.sources),
                outgroups: split_list(&row.outgroups),
                outcome,
            });
        }

        if fits.is_empty() {
            return Err(AdmixError::EmptyData(format!(
                "no fits in {}",
                path.as_ref().display()
            )));
        }

        let catalog = catalog.unwrap_or_else(|| {
            PopulationCatalog::new(fits.iter().flat_map(|f| {
                std::iter::once(f.target.clone())
                    .chain(f.sources.iter().cloned())
                    .chain(f.outgroups.iter().cloned())
            }))
        });

        Ok(Self::new(catalog, fits))
    }

    /// Number of recorded models.
    pub fn len(&self) -> usize {
        self.fits.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }
}

impl Dataset for PrecomputedDataset {
    fn catalog(&self) -> Result<PopulationCatalog> {
        Ok(self.catalog.clone())
    }

    fn solve(
        &self,
        target: &Population,
        sources: &[Population],
        outgroups: &[Population],
        _options: &SolverOptions,
    ) -> Result<SolverOutput> {
        let Some(fit) = self.fits.get(&key(target, sources, outgroups)) else {
            return Err(AdmixError::Solver(format!(
                "no recorded fit for {} ~ {}",
                target,
                sources
                    .iter()
                    .map(Population::as_str)
                    .collect::<Vec<_>>()
                    .join(" + ")
            )));
        };
        match &fit.outcome {
            Ok(output) => Ok(fit.reordered(output, sources)),
            Err(message) => Err(AdmixError::Solver(message.clone())),
        }
    }
}
