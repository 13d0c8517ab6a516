//! Result types for fitted admixture models.

use crate::data::Population;
use crate::error::{AdmixError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fit quality label derived from a model's p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitQuality {
    /// p > 0.05
    Excellent,
    /// 0.01 < p <= 0.05
    Good,
    /// 0.001 < p <= 0.01
    Marginal,
    /// p <= 0.001
    Poor,
}

impl FitQuality {
    /// Classify a p-value. Boundaries belong to the lower class, so exactly
    /// 0.05 is `Good`.
    pub fn from_p_value(p: f64) -> Self {
        if p > 0.05 {
            Self::Excellent
        } else if p > 0.01 {
            Self::Good
        } else if p > 0.001 {
            Self::Marginal
        } else {
            Self::Poor
        }
    }

    /// Get the label as printed in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT",
            Self::Good => "GOOD",
            Self::Marginal => "MARGINAL",
            Self::Poor => "POOR",
        }
    }
}

impl fmt::Display for FitQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Estimated contribution of one source population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEstimate {
    /// Source population as actually solved.
    pub population: Population,
    /// Mixture weight, expected near [0, 1].
    pub weight: f64,
    /// Standard error of the weight.
    pub std_error: f64,
}

/// A population replaced by a fallback before solving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub original: Population,
    pub replacement: Population,
}

/// Outcome of one successful model fit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResult {
    /// Label of the model this result belongs to.
    pub label: String,
    /// Target population.
    pub target: Population,
    /// Per-source estimates, in source order.
    pub sources: Vec<SourceEstimate>,
    /// Outgroups used for the fit.
    pub outgroups: Vec<Population>,
    /// Overall model p-value.
    pub p_value: f64,
    /// Quality label derived from the p-value.
    pub quality: FitQuality,
    /// Substitutions applied before solving.
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

impl ModelResult {
    /// Build a result from parallel weight/stderr vectors.
    ///
    /// Fails with `InvalidResult` when the vectors do not match the sources or
    /// the numbers are out of range.
    pub fn new(
        label: &str,
        target: Population,
        sources: &[Population],
        outgroups: Vec<Population>,
        weights: &[f64],
        std_errors: &[f64],
        p_value: f64,
    ) -> Result<Self> {
        let invalid = |reason: String| AdmixError::InvalidResult {
            label: label.to_string(),
            reason,
        };
        if weights.len() != sources.len() {
            return Err(invalid(format!(
                "{} weights for {} sources",
                weights.len(),
                sources.len()
            )));
        }
        if std_errors.len() != sources.len() {
            return Err(invalid(format!(
                "{} standard errors for {} sources",
                std_errors.len(),
                sources.len()
            )));
        }

        let estimates = sources
            .iter()
            .zip(weights.iter().zip(std_errors.iter()))
            .map(|(population, (&weight, &std_error))| SourceEstimate {
                population: population.clone(),
                weight,
                std_error,
            })
            .collect();

        let result = Self {
            label: label.to_string(),
            target,
            sources: estimates,
            outgroups,
            p_value,
            quality: FitQuality::from_p_value(p_value),
            substitutions: Vec::new(),
        };
        result.validate()?;
        Ok(result)
    }

    /// Attach the substitutions that were applied to produce this fit.
    pub fn with_substitutions(mut self, substitutions: Vec<Substitution>) -> Self {
        self.substitutions = substitutions;
        self
    }

    /// Check invariants: p-value in [0, 1] with a matching quality label,
    /// finite weights, finite non-negative standard errors, at least one source.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| AdmixError::InvalidResult {
            label: self.label.clone(),
            reason,
        };
        if !(0.0..=1.0).contains(&self.p_value) {
            return Err(invalid(format!("p-value {} outside [0, 1]", self.p_value)));
        }
        let expected = FitQuality::from_p_value(self.p_value);
        if self.quality != expected {
            return Err(invalid(format!(
                "quality {} does not match p-value {} ({})",
                self.quality, self.p_value, expected
            )));
        }
        if self.sources.is_empty() {
            return Err(invalid("no source estimates".to_string()));
        }
        for s in &self.sources {
            if !s.weight.is_finite() {
                return Err(invalid(format!("non-finite weight for '{}'", s.population)));
            }
            if !s.std_error.is_finite() || s.std_error < 0.0 {
                return Err(invalid(format!(
                    "invalid standard error {} for '{}'",
                    s.std_error, s.population
                )));
            }
        }
        Ok(())
    }

    /// Sum of all weights, ~1.0 for a well-formed fit.
    pub fn weight_sum(&self) -> f64 {
        self.sources.iter().map(|s| s.weight).sum()
    }

    /// Whether every weight lies in [0, 1].
    pub fn is_feasible(&self) -> bool {
        self.sources.iter().all(|s| (0.0..=1.0).contains(&s.weight))
    }

    /// Look up the estimate for a source population.
    pub fn source(&self, population: &str) -> Option<&SourceEstimate> {
        self.sources.iter().find(|s| s.population.as_str() == population)
    }
}
