//! Running many models against the same dataset.

use super::model::{ModelRunner, RunOutcome, SkipReason};
use crate::data::{ModelResult, ModelSpec};
use crate::error::{AdmixError, Result};
use log::{info, warn};
use rayon::prelude::*;

/// One model's outcome within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Model label.
    pub label: String,
    /// Report group, if configured.
    pub group: Option<String>,
    /// What happened.
    pub outcome: RunOutcome,
}

/// All outcomes of a batch, in the order the models were given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
}

impl BatchResult {
    /// Number of models attempted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of models that produced a fit.
    pub fn n_fitted(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_fitted()).count()
    }

    /// Whether every model was skipped.
    pub fn all_failed(&self) -> bool {
        self.n_fitted() == 0
    }

    /// `(label, result)` pairs in input order, `None` for skipped models.
    pub fn results(&self) -> Vec<(&str, Option<&ModelResult>)> {
        self.entries
            .iter()
            .map(|e| (e.label.as_str(), e.outcome.result()))
            .collect()
    }

    /// `(label, reason)` for every skipped model.
    pub fn skipped(&self) -> Vec<(&str, &SkipReason)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.skip_reason().map(|r| (e.label.as_str(), r)))
            .collect()
    }
}

impl<'a> ModelRunner<'a> {
    /// Run a batch of models.
    ///
    /// Missing populations, solver failures and malformed models are recorded
    /// per model and the batch continues. A missing target aborts the batch;
    /// an `InvalidResult` from the solver adapter is propagated.
    ///
    /// With `SolverOptions::parallel`, models are fitted on the rayon pool;
    /// entry order always follows `specs`.
    pub fn run_batch(&self, specs: &[ModelSpec]) -> Result<BatchResult> {
        info!(
            "Running {} models against {} populations",
            specs.len(),
            self.catalog().len()
        );

        let entries: Vec<BatchEntry> = if self.solver_options().parallel {
            specs
                .par_iter()
                .map(|spec| self.run_entry(spec))
                .collect::<Result<_>>()?
        } else {
            specs
                .iter()
                .map(|spec| self.run_entry(spec))
                .collect::<Result<_>>()?
        };

        let batch = BatchResult { entries };
        info!("{} of {} models fitted", batch.n_fitted(), batch.len());
        Ok(batch)
    }

    fn run_entry(&self, spec: &ModelSpec) -> Result<BatchEntry> {
        let outcome = match self.run(spec) {
            Ok(outcome) => outcome,
            Err(AdmixError::InvalidModelSpec { label, reason }) => {
                warn!("{}: rejected, {}", label, reason);
                RunOutcome::Skipped(SkipReason::InvalidModelSpec(reason))
            }
            Err(e) => return Err(e),
        };
        Ok(BatchEntry {
            label: spec.label.clone(),
            group: spec.group.clone(),
            outcome,
        })
    }
}
