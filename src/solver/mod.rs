//! Interface to the external admixture solver.
//!
//! The statistics (f2 blocks, GLS weights, jackknife standard errors, the
//! model p-value) live outside this crate. A [`Dataset`] wraps one loaded
//! dataset and exposes the two things the runner needs: which populations
//! exist, and a way to fit one model.
//!
//! Two implementations are provided:
//!
//! - [`PrecomputedDataset`]: replays fits from a TSV export
//! - [`RscriptDataset`]: drives ADMIXTOOLS 2 `qpadm()` through `Rscript`

mod precomputed;
mod rscript;

pub use precomputed::{PrecomputedDataset, PrecomputedFit};
pub use rscript::{catalog_from_f2_dir, RscriptDataset};

use crate::data::{Population, PopulationCatalog};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options passed through to the solver for every fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Use all SNPs per population pair instead of only SNPs shared by every population.
    pub allsnps: bool,
    /// Wall-clock limit for one fit, in seconds. `0` disables the limit.
    pub timeout_secs: u64,
    /// Fit models on the rayon pool instead of one after another.
    pub parallel: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            allsnps: false,
            timeout_secs: 600,
            parallel: false,
        }
    }
}

impl SolverOptions {
    /// The per-fit timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Raw solver output for one model.
///
/// Standard errors are optional here because not every solver path reports
/// them; the runner treats their absence as a solver failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    /// Weights, one per source in the order the sources were passed.
    pub weights: Vec<f64>,
    /// Standard errors matching `weights`.
    pub std_errors: Option<Vec<f64>>,
    /// Model p-value.
    pub p_value: f64,
}

/// A loaded dataset the admixture solver can run against.
///
/// `solve` errors are reported as `AdmixError::Solver`. Implementations must be
/// shareable across threads so batches can run in parallel.
pub trait Dataset: Send + Sync {
    /// Populations present in the dataset.
    fn catalog(&self) -> Result<PopulationCatalog>;

    /// Fit one model. Sources are ordered; outgroups are a set.
    fn solve(
        &self,
        target: &Population,
        sources: &[Population],
        outgroups: &[Population],
        options: &SolverOptions,
    ) -> Result<SolverOutput>;
}
