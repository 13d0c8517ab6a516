//! Ranking fitted models by p-value.
//!
//! A qpAdm model is accepted when its p-value exceeds a threshold
//! (conventionally 0.05): the data do not reject the proposed mixture.
//! Accepted models are ordered by descending p-value, ties keeping their
//! input order, and the first one is reported as the best fit.

use crate::data::{ModelResult, Population};
use crate::error::{AdmixError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Default acceptance threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

/// Symmetric 95% interval around a weight, clamped to [0, 1].
///
/// For display only: near the boundaries the clamp makes this something other
/// than a Gaussian interval.
pub fn confidence_interval(weight: f64, std_error: f64) -> (f64, f64) {
    let half_width = Z_95 * std_error;
    (
        (weight - half_width).max(0.0),
        (weight + half_width).min(1.0),
    )
}

/// One accepted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Model label.
    pub label: String,
    /// The fit.
    pub result: ModelResult,
}

impl RankedEntry {
    /// 95% interval for every source, in source order.
    pub fn intervals(&self) -> Vec<(&Population, f64, f64)> {
        self.result
            .sources
            .iter()
            .map(|s| {
                let (lo, hi) = confidence_interval(s.weight, s.std_error);
                (&s.population, lo, hi)
            })
            .collect()
    }
}

/// What the ranking concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingOutcome {
    /// At least one model passed the threshold.
    BestModel,
    /// Some models were fitted but none passed the threshold.
    NoAcceptableModel,
    /// No model produced a fit at all.
    AllModelsFailed,
}

impl fmt::Display for RankingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingOutcome::BestModel => write!(f, "best model found"),
            RankingOutcome::NoAcceptableModel => write!(f, "no model met the acceptance threshold"),
            RankingOutcome::AllModelsFailed => write!(f, "all models failed"),
        }
    }
}

/// Accepted models ordered by descending p-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedReport {
    /// Acceptance threshold used (p must be strictly greater).
    pub threshold: f64,
    /// Accepted models, best first.
    pub entries: Vec<RankedEntry>,
    /// Number of models offered for ranking, including failures.
    pub n_input: usize,
    /// Number of models that produced a fit.
    pub n_fitted: usize,
}

impl RankedReport {
    /// The best model, if any passed the threshold.
    pub fn best(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }

    /// Distinguish "no acceptable model" from "nothing was fitted".
    pub fn outcome(&self) -> RankingOutcome {
        if !self.entries.is_empty() {
            RankingOutcome::BestModel
        } else if self.n_fitted > 0 {
            RankingOutcome::NoAcceptableModel
        } else {
            RankingOutcome::AllModelsFailed
        }
    }

    /// Number of accepted models.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over accepted models, best first.
    pub fn iter(&self) -> impl Iterator<Item = &RankedEntry> {
        self.entries.iter()
    }

    /// Accepted entries as ranking input, for re-ranking.
    pub fn as_input(&self) -> Vec<(&str, Option<&ModelResult>)> {
        self.entries
            .iter()
            .map(|e| (e.label.as_str(), Some(&e.result)))
            .collect()
    }
}

impl fmt::Display for RankedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model Ranking (p > {})", self.threshold)?;
        writeln!(f, "========================")?;
        writeln!(
            f,
            "Models: {} tested, {} fitted, {} accepted",
            self.n_input,
            self.n_fitted,
            self.entries.len()
        )?;
        match self.best() {
            Some(best) => {
                writeln!(f)?;
                writeln!(
                    f,
                    "Best: {} (p = {:.4}, {})",
                    best.label, best.result.p_value, best.result.quality
                )?;
                for s in &best.result.sources {
                    let (lo, hi) = confidence_interval(s.weight, s.std_error);
                    writeln!(
                        f,
                        "  {:<28} {:>6.1}% ± {:>4.1}%  [{:.1}% - {:.1}%]",
                        s.population,
                        100.0 * s.weight,
                        100.0 * s.std_error,
                        100.0 * lo,
                        100.0 * hi
                    )?;
                }
            }
            None => writeln!(f, "{}", self.outcome())?,
        }
        Ok(())
    }
}

/// Filter and rank model results.
///
/// `None` results (skipped models) are dropped. Results with
/// `p_value <= threshold` are excluded. Survivors are sorted by descending
/// p-value with a stable sort, so equal p-values keep their input order.
///
/// Any result violating its numeric invariants fails the whole ranking with
/// `InvalidResult` rather than being dropped.
pub fn rank<'a, I>(results: I, threshold: f64) -> Result<RankedReport>
where
    I: IntoIterator<Item = (&'a str, Option<&'a ModelResult>)>,
{
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AdmixError::InvalidParameter(format!(
            "acceptance threshold {} outside [0, 1]",
            threshold
        )));
    }

    let mut n_input = 0;
    let mut n_fitted = 0;
    let mut entries = Vec::new();
    for (label, result) in results {
        n_input += 1;
        let Some(result) = result else {
            continue;
        };
        result.validate()?;
        n_fitted += 1;
        if result.p_value > threshold {
            entries.push(RankedEntry {
                label: label.to_string(),
                result: result.clone(),
            });
        }
    }

    entries.sort_by(|a, b| {
        b.result
            .p_value
            .partial_cmp(&a.result.p_value)
            .unwrap_or(Ordering::Equal)
    });

    Ok(RankedReport {
        threshold,
        entries,
        n_input,
        n_fitted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FitQuality, SourceEstimate};
    use approx::assert_relative_eq;

    fn result(label: &str, p_value: f64, weight: f64) -> ModelResult {
        ModelResult {
            label: label.to_string(),
            target: "A".into(),
            sources: vec![
                SourceEstimate {
                    population: "B".into(),
                    weight,
                    std_error: 0.04,
                },
                SourceEstimate {
                    population: "C".into(),
                    weight: 1.0 - weight,
                    std_error: 0.04,
                },
            ],
            outgroups: vec!["OUT1".into()],
            p_value,
            quality: FitQuality::from_p_value(p_value),
            substitutions: vec![],
        }
    }

    fn labels(report: &RankedReport) -> Vec<&str> {
        report.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn test_rank_filters_and_orders() {
        let a = result("m1", 0.06, 0.5);
        let b = result("m2", 0.002, 0.5);
        let c = result("m3", 0.20, 0.5);
        let report = rank(
            vec![("m1", Some(&a)), ("m2", Some(&b)), ("m3", Some(&c))],
            DEFAULT_THRESHOLD,
        )
        .unwrap();

        assert_eq!(labels(&report), vec!["m3", "m1"]);
        assert_eq!(report.best().unwrap().label, "m3");
        assert_eq!(report.outcome(), RankingOutcome::BestModel);
        assert_eq!(report.n_input, 3);
        assert_eq!(report.n_fitted, 3);
    }

    #[test]
    fn test_threshold_is_strict() {
        let a = result("at", 0.05, 0.5);
        let b = result("above", 0.0501, 0.5);
        let report = rank(vec![("at", Some(&a)), ("above", Some(&b))], 0.05).unwrap();
        assert_eq!(labels(&report), vec!["above"]);
    }

    #[test]
    fn test_low_p_excluded_regardless_of_weights() {
        let a = result("neat", 0.01, 0.5);
        let b = result("messy", 0.01, 1.7);
        let report = rank(vec![("neat", Some(&a)), ("messy", Some(&b))], 0.05).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.outcome(), RankingOutcome::NoAcceptableModel);
    }

    #[test]
    fn test_stable_ties() {
        let a = result("first", 0.3, 0.2);
        let b = result("second", 0.3, 0.8);
        let c = result("third", 0.3, 0.5);
        let report = rank(
            vec![("first", Some(&a)), ("second", Some(&b)), ("third", Some(&c))],
            0.05,
        )
        .unwrap();
        assert_eq!(labels(&report), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rank_is_idempotent() {
        let a = result("m1", 0.06, 0.5);
        let b = result("m2", 0.4, 0.5);
        let c = result("m3", 0.4, 0.3);
        let once = rank(
            vec![("m1", Some(&a)), ("m2", Some(&b)), ("m3", Some(&c))],
            0.05,
        )
        .unwrap();
        let twice = rank(once.as_input(), 0.05).unwrap();
        assert_eq!(once.entries, twice.entries);
    }

    #[test]
    fn test_all_failed_distinct_from_none_accepted() {
        let report = rank(vec![("m1", None), ("m2", None)], 0.05).unwrap();
        assert!(report.best().is_none());
        assert_eq!(report.outcome(), RankingOutcome::AllModelsFailed);
        assert_eq!(report.n_input, 2);
        assert_eq!(report.n_fitted, 0);
    }

    #[test]
    fn test_invalid_result_is_rejected() {
        let mut bad = result("bad", 0.3, 0.5);
        bad.p_value = 1.2;
        let err = rank(vec![("bad", Some(&bad))], 0.05).unwrap_err();
        assert!(matches!(err, AdmixError::InvalidResult { .. }));

        let mut bad = result("bad", 0.3, 0.5);
        bad.sources[0].std_error = -1.0;
        assert!(rank(vec![("bad", Some(&bad))], 0.05).is_err());

        // A deserialized result whose label disagrees with its p-value.
        let mut bad = result("bad", 0.3, 0.5);
        bad.quality = FitQuality::Poor;
        assert!(matches!(
            rank(vec![("bad", Some(&bad))], 0.05),
            Err(AdmixError::InvalidResult { .. })
        ));
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(matches!(
            rank(Vec::new(), 1.5),
            Err(AdmixError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_confidence_interval_clamps_upper() {
        let (lo, hi) = confidence_interval(0.95, 0.04);
        assert_relative_eq!(lo, 0.8716, epsilon = 1e-12);
        assert_relative_eq!(hi, 1.0);
    }

    #[test]
    fn test_confidence_interval_bounds() {
        for &w in &[0.0, 0.01, 0.3, 0.5, 0.99, 1.0] {
            for &se in &[0.0, 0.001, 0.05, 0.3, 2.0] {
                let (lo, hi) = confidence_interval(w, se);
                assert!(lo <= w && w <= hi, "w={} se={}", w, se);
                assert!(lo >= 0.0 && hi <= 1.0, "w={} se={}", w, se);
            }
        }
    }

    #[test]
    fn test_display_mentions_best() {
        let a = result("Pakistani_3way", 0.2, 0.6);
        let report = rank(vec![("Pakistani_3way", Some(&a))], 0.05).unwrap();
        let text = report.to_string();
        assert!(text.contains("Best: Pakistani_3way"));
        assert!(text.contains("EXCELLENT"));

        let empty = rank(vec![("x", None)], 0.05).unwrap();
        assert!(empty.to_string().contains("all models failed"));
    }
}
