//! Running a single admixture model.

use crate::data::{ModelResult, ModelSpec, Population, PopulationCatalog, Substitution, SubstitutionTable};
use crate::error::{AdmixError, Result};
use crate::solver::{Dataset, SolverOptions};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a model produced no result. All of these leave the batch running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Populations still missing after substitution.
    PopulationsUnavailable(Vec<Population>),
    /// The solver failed on a valid, fully-resolved model.
    SolverError(String),
    /// The model itself was malformed (only recorded in batches).
    InvalidModelSpec(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PopulationsUnavailable(pops) => write!(
                f,
                "populations unavailable: {}",
                pops.iter().map(Population::as_str).collect::<Vec<_>>().join(", ")
            ),
            SkipReason::SolverError(msg) => write!(f, "solver error: {}", msg),
            SkipReason::InvalidModelSpec(msg) => write!(f, "invalid model: {}", msg),
        }
    }
}

/// Result of running one model: a fit, or a recoverable skip.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Fitted(ModelResult),
    Skipped(SkipReason),
}

impl RunOutcome {
    /// The fitted result, if any.
    pub fn result(&self) -> Option<&ModelResult> {
        match self {
            RunOutcome::Fitted(r) => Some(r),
            RunOutcome::Skipped(_) => None,
        }
    }

    /// The skip reason, if the model was skipped.
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            RunOutcome::Fitted(_) => None,
            RunOutcome::Skipped(reason) => Some(reason),
        }
    }

    /// Check if the model was fitted.
    pub fn is_fitted(&self) -> bool {
        matches!(self, RunOutcome::Fitted(_))
    }
}

/// Runs models against one dataset with a fixed catalog and substitution table.
///
/// The catalog is read from the dataset once at construction and never
/// changes afterwards.
pub struct ModelRunner<'a> {
    dataset: &'a dyn Dataset,
    catalog: PopulationCatalog,
    substitutions: SubstitutionTable,
    options: SolverOptions,
}

impl<'a> ModelRunner<'a> {
    /// Create a runner, loading the catalog from the dataset.
    pub fn new(dataset: &'a dyn Dataset) -> Result<Self> {
        let catalog = dataset.catalog()?;
        Ok(Self::with_catalog(dataset, catalog))
    }

    /// Create a runner with an explicit catalog.
    pub fn with_catalog(dataset: &'a dyn Dataset, catalog: PopulationCatalog) -> Self {
        Self {
            dataset,
            catalog,
            substitutions: SubstitutionTable::new(),
            options: SolverOptions::default(),
        }
    }

    /// Set the substitution table.
    pub fn substitutions(mut self, substitutions: SubstitutionTable) -> Self {
        self.substitutions = substitutions;
        self
    }

    /// Set solver options.
    pub fn options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    /// The catalog models are checked against.
    pub fn catalog(&self) -> &PopulationCatalog {
        &self.catalog
    }

    /// The solver options in use.
    pub fn solver_options(&self) -> &SolverOptions {
        &self.options
    }

    /// Apply substitutions for every missing population that has an available
    /// fallback. The target is never substituted.
    ///
    /// Returns the rewritten spec and the substitutions applied.
    pub fn resolve(&self, spec: &ModelSpec) -> Result<(ModelSpec, Vec<Substitution>)> {
        let missing = self.catalog.missing(spec.populations());
        if missing.contains(&spec.target) {
            return Err(AdmixError::TargetNotFound(spec.target.to_string()));
        }

        let mut resolved = spec.clone();
        let mut applied = Vec::new();
        for population in &missing {
            let Some(fallback) = self.substitutions.resolve(population.as_str(), &self.catalog)
            else {
                continue;
            };
            for slot in resolved
                .sources
                .iter_mut()
                .chain(resolved.outgroups.iter_mut())
                .filter(|p| **p == *population)
            {
                *slot = fallback.clone();
            }
            debug!("{}: substituting {} -> {}", spec.label, population, fallback);
            applied.push(Substitution {
                original: population.clone(),
                replacement: fallback.clone(),
            });
        }

        Ok((resolved, applied))
    }

    /// Run one model.
    ///
    /// `TargetNotFound` and `InvalidModelSpec` are returned as errors: the first
    /// means nothing can succeed, the second is a configuration mistake.
    /// `InvalidResult` means the solver adapter broke its contract. Missing
    /// populations and solver failures are returned as `RunOutcome::Skipped`.
    pub fn run(&self, spec: &ModelSpec) -> Result<RunOutcome> {
        let (resolved, applied) = self.resolve(spec)?;
        spec.validate()?;
        // Substitution can collapse two populations into one.
        resolved.validate()?;

        let missing = self.catalog.missing(resolved.populations());
        if !missing.is_empty() {
            let reason = SkipReason::PopulationsUnavailable(missing);
            warn!("{}: skipped, {}", spec.label, reason);
            return Ok(RunOutcome::Skipped(reason));
        }

        let output = match self.dataset.solve(
            &resolved.target,
            &resolved.sources,
            &resolved.outgroups,
            &self.options,
        ) {
            Ok(output) => output,
            Err(e) => return Ok(self.solver_skip(spec, solver_message(e))),
        };

        let Some(std_errors) = output.std_errors else {
            return Ok(self.solver_skip(spec, "solver returned no standard errors".to_string()));
        };
        if output.weights.len() != resolved.sources.len() || std_errors.len() != resolved.sources.len()
        {
            return Ok(self.solver_skip(
                spec,
                format!(
                    "solver returned {} weights and {} standard errors for {} sources",
                    output.weights.len(),
                    std_errors.len(),
                    resolved.sources.len()
                ),
            ));
        }

        let result = ModelResult::new(
            &spec.label,
            resolved.target.clone(),
            &resolved.sources,
            resolved.outgroups.clone(),
            &output.weights,
            &std_errors,
            output.p_value,
        )?
        .with_substitutions(applied);

        info!(
            "{}: p = {:.4} ({})",
            spec.label, result.p_value, result.quality
        );
        Ok(RunOutcome::Fitted(result))
    }

    fn solver_skip(&self, spec: &ModelSpec, message: String) -> RunOutcome {
        let reason = SkipReason::SolverError(message);
        warn!("{}: skipped, {}", spec.label, reason);
        RunOutcome::Skipped(reason)
    }
}

fn solver_message(err: AdmixError) -> String {
    match err {
        AdmixError::Solver(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::solver::SolverOutput;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Equal-weight solver with a fixed p-value; counts its calls.
    pub(crate) struct MockDataset {
        pub catalog: PopulationCatalog,
        pub p_value: f64,
        pub fail_with: Option<String>,
        pub omit_std_errors: bool,
        pub calls: AtomicUsize,
    }

    impl MockDataset {
        pub(crate) fn new(populations: &[&str]) -> Self {
            Self {
                catalog: PopulationCatalog::new(populations.iter().copied()),
                p_value: 0.3,
                fail_with: None,
                omit_std_errors: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Dataset for MockDataset {
        fn catalog(&self) -> Result<PopulationCatalog> {
            Ok(self.catalog.clone())
        }

        fn solve(
            &self,
            _target: &Population,
            sources: &[Population],
            _outgroups: &[Population],
            _options: &SolverOptions,
        ) -> Result<SolverOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.fail_with {
                return Err(AdmixError::Solver(msg.clone()));
            }
            let n = sources.len();
            Ok(SolverOutput {
                weights: vec![1.0 / n as f64; n],
                std_errors: (!self.omit_std_errors).then(|| vec![0.05; n]),
                p_value: self.p_value,
            })
        }
    }

    fn spec(sources: &[&str], outgroups: &[&str]) -> ModelSpec {
        ModelSpec::new("m", "A", sources.iter().copied(), outgroups.iter().copied())
    }

    #[test]
    fn test_run_all_present() {
        let dataset = MockDataset::new(&["A", "B", "C", "OUT1", "OUT2"]);
        let runner = ModelRunner::new(&dataset).unwrap();

        let outcome = runner.run(&spec(&["B", "C"], &["OUT1", "OUT2"])).unwrap();
        let result = outcome.result().unwrap();
        assert_relative_eq!(result.weight_sum(), 1.0);
        assert_eq!(result.sources[0].population.as_str(), "B");
        assert!(result.substitutions.is_empty());
    }

    #[test]
    fn test_missing_target_fails_before_solving() {
        let dataset = MockDataset::new(&["B", "C", "OUT1"]);
        let runner = ModelRunner::new(&dataset).unwrap();

        let err = runner.run(&spec(&["B", "C"], &["OUT1"])).unwrap_err();
        assert!(matches!(err, AdmixError::TargetNotFound(ref t) if t == "A"));
        assert_eq!(dataset.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_substitution_applied_when_fallback_present() {
        let dataset = MockDataset::new(&["A", "B2", "C", "OUT1"]);
        let runner = ModelRunner::new(&dataset)
            .unwrap()
            .substitutions(SubstitutionTable::new().with("B", "B2"));

        let outcome = runner.run(&spec(&["B", "C"], &["OUT1"])).unwrap();
        let result = outcome.result().unwrap();
        assert_eq!(result.sources[0].population.as_str(), "B2");
        assert_eq!(result.substitutions.len(), 1);
        assert_eq!(result.substitutions[0].original.as_str(), "B");
    }

    #[test]
    fn test_substitution_in_outgroups() {
        let dataset = MockDataset::new(&["A", "B", "OUT1b"]);
        let runner = ModelRunner::new(&dataset)
            .unwrap()
            .substitutions(SubstitutionTable::new().with("OUT1", "OUT1b"));

        let outcome = runner.run(&spec(&["B"], &["OUT1"])).unwrap();
        assert_eq!(outcome.result().unwrap().outgroups[0].as_str(), "OUT1b");
    }

    #[test]
    fn test_unavailable_when_fallback_absent() {
        let dataset = MockDataset::new(&["A", "C", "OUT1"]);
        let runner = ModelRunner::new(&dataset)
            .unwrap()
            .substitutions(SubstitutionTable::new().with("B", "B2"));

        let outcome = runner.run(&spec(&["B", "C"], &["OUT1"])).unwrap();
        assert_eq!(
            outcome.skip_reason(),
            Some(&SkipReason::PopulationsUnavailable(vec!["B".into()]))
        );
        assert_eq!(dataset.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_target_is_never_substituted() {
        let dataset = MockDataset::new(&["A2", "B", "OUT1"]);
        let runner = ModelRunner::new(&dataset)
            .unwrap()
            .substitutions(SubstitutionTable::new().with("A", "A2"));

        let err = runner.run(&spec(&["B"], &["OUT1"])).unwrap_err();
        assert!(matches!(err, AdmixError::TargetNotFound(_)));
    }

    #[test]
    fn test_substitution_creating_duplicate_is_invalid() {
        let dataset = MockDataset::new(&["A", "C", "OUT1"]);
        let runner = ModelRunner::new(&dataset)
            .unwrap()
            .substitutions(SubstitutionTable::new().with("B", "C"));

        let err = runner.run(&spec(&["B", "C"], &["OUT1"])).unwrap_err();
        assert!(matches!(err, AdmixError::InvalidModelSpec { .. }));
        assert_eq!(dataset.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_spec_rejected_before_solving() {
        let dataset = MockDataset::new(&["A", "B", "OUT1"]);
        let runner = ModelRunner::new(&dataset).unwrap();

        assert!(matches!(
            runner.run(&spec(&[], &["OUT1"])),
            Err(AdmixError::InvalidModelSpec { .. })
        ));
        assert!(matches!(
            runner.run(&spec(&["B", "B"], &["OUT1"])),
            Err(AdmixError::InvalidModelSpec { .. })
        ));
        assert_eq!(dataset.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_solver_error_is_skip() {
        let mut dataset = MockDataset::new(&["A", "B", "C"]);
        dataset.fail_with = Some("singular covariance".to_string());
        let runner = ModelRunner::new(&dataset).unwrap();

        // Empty outgroups reach the solver; its failure is a plain skip.
        let outcome = runner.run(&spec(&["B", "C"], &[])).unwrap();
        assert_eq!(
            outcome.skip_reason(),
            Some(&SkipReason::SolverError("singular covariance".to_string()))
        );
    }

    #[test]
    fn test_missing_std_errors_is_solver_error() {
        let mut dataset = MockDataset::new(&["A", "B", "OUT1"]);
        dataset.omit_std_errors = true;
        let runner = ModelRunner::new(&dataset).unwrap();

        let outcome = runner.run(&spec(&["B"], &["OUT1"])).unwrap();
        assert!(matches!(
            outcome.skip_reason(),
            Some(SkipReason::SolverError(_))
        ));
    }

    #[test]
    fn test_count_mismatch_is_solver_error() {
        use crate::solver::{PrecomputedDataset, PrecomputedFit};

        let dataset = PrecomputedDataset::new(
            PopulationCatalog::new(["A", "B", "C", "OUT1"]),
            vec![PrecomputedFit {
                target: "A".into(),
                sources: vec!["B".into(), "C".into()],
                outgroups: vec!["OUT1".into()],
                outcome: Ok(SolverOutput {
                    weights: vec![0.6, 0.4],
                    std_errors: Some(vec![0.05]),
                    p_value: 0.3,
                }),
            }],
        );
        let runner = ModelRunner::new(&dataset).unwrap();

        let outcome = runner.run(&spec(&["B", "C"], &["OUT1"])).unwrap();
        match outcome.skip_reason() {
            Some(SkipReason::SolverError(msg)) => assert!(msg.contains("2 weights and 1")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_p_value_is_invalid_result() {
        let mut dataset = MockDataset::new(&["A", "B", "OUT1"]);
        dataset.p_value = 1.5;
        let runner = ModelRunner::new(&dataset).unwrap();

        let err = runner.run(&spec(&["B"], &["OUT1"])).unwrap_err();
        assert!(matches!(err, AdmixError::InvalidResult { .. }));
    }

    #[test]
    fn test_quality_label_attached() {
        let mut dataset = MockDataset::new(&["A", "B", "OUT1"]);
        dataset.p_value = 0.05;
        let runner = ModelRunner::new(&dataset).unwrap();

        let outcome = runner.run(&spec(&["B"], &["OUT1"])).unwrap();
        assert_eq!(outcome.result().unwrap().quality, crate::data::FitQuality::Good);
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::PopulationsUnavailable(vec!["X".into(), "Y".into()]);
        assert_eq!(reason.to_string(), "populations unavailable: X, Y");
    }
}
