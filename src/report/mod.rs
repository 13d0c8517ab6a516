//! Ancestry reports.
//!
//! An [`AncestryReport`] combines the outcome of a batch with its ranking:
//! per-group percentage breakdowns from the best accepted model of each
//! group, every accepted model with its intervals, fit counts, and the
//! reasons models were skipped. Reports serialize to JSON and can be read
//! back for re-rendering as text or TSV.

use crate::data::{FitQuality, Population, Substitution};
use crate::error::Result;
use crate::rank::{confidence_interval, RankedReport, RankingOutcome};
use crate::runner::{BatchResult, SkipReason};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Percentages per source population.
pub type Breakdown = BTreeMap<String, f64>;

/// One source of an accepted model.
///
/// `weight` and `weight_std_error` are the fitted fractions as solved. The
/// remaining fields are the same numbers times 100 for display, with the
/// interval clamped to [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEstimate {
    pub population: Population,
    pub weight: f64,
    pub weight_std_error: f64,
    pub percent: f64,
    pub std_error: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// An accepted model as shown in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Position in the ranking, 1 for the best model.
    pub rank: usize,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub p_value: f64,
    pub quality: FitQuality,
    pub components: Vec<ComponentEstimate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,
}

/// Fit counts over the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total_models_tested: usize,
    pub successful_models: usize,
    /// p > 0.05
    pub excellent_fits: usize,
    /// 0.01 < p <= 0.05
    pub good_fits: usize,
    /// Mean p-value of the fitted models; `None` when nothing was fitted.
    pub average_pvalue: Option<f64>,
}

/// A model that produced no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedModel {
    pub label: String,
    pub reason: SkipReason,
}

/// Complete report for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncestryReport {
    /// Target sample or population.
    pub sample_id: String,
    /// Name of the analysis that produced this report.
    pub analysis: String,
    /// RFC 3339 generation time.
    pub generated: String,
    /// Acceptance threshold used for ranking.
    pub threshold: f64,
    pub outcome: RankingOutcome,
    /// Group name to breakdown of that group's best accepted model.
    pub ancestry_breakdowns: BTreeMap<String, Breakdown>,
    /// Accepted models, best first.
    pub statistical_models: Vec<ModelSummary>,
    pub quality_metrics: QualityMetrics,
    pub skipped: Vec<SkippedModel>,
}

impl AncestryReport {
    /// Assemble a report from a batch and its ranking.
    ///
    /// Models without a group are reported under their own label in
    /// `ancestry_breakdowns`.
    pub fn new(sample_id: &str, analysis: &str, batch: &BatchResult, ranking: &RankedReport) -> Self {
        let groups: HashMap<&str, Option<&str>> = batch
            .entries
            .iter()
            .map(|e| (e.label.as_str(), e.group.as_deref()))
            .collect();

        let statistical_models: Vec<ModelSummary> = ranking
            .iter()
            .enumerate()
            .map(|(i, entry)| ModelSummary {
                rank: i + 1,
                label: entry.label.clone(),
                group: groups
                    .get(entry.label.as_str())
                    .copied()
                    .flatten()
                    .map(str::to_string),
                p_value: entry.result.p_value,
                quality: entry.result.quality,
                components: entry
                    .result
                    .sources
                    .iter()
                    .map(|s| {
                        let (lo, hi) = confidence_interval(s.weight, s.std_error);
                        ComponentEstimate {
                            population: s.population.clone(),
                            weight: s.weight,
                            weight_std_error: s.std_error,
                            percent: 100.0 * s.weight,
                            std_error: 100.0 * s.std_error,
                            ci_lower: 100.0 * lo,
                            ci_upper: 100.0 * hi,
                        }
                    })
                    .collect(),
                substitutions: entry.result.substitutions.clone(),
            })
            .collect();

        // Ranking order is best first, so the first model seen per group wins.
        let mut ancestry_breakdowns = BTreeMap::new();
        for model in &statistical_models {
            let key = model.group.clone().unwrap_or_else(|| model.label.clone());
            ancestry_breakdowns.entry(key).or_insert_with(|| {
                model
                    .components
                    .iter()
                    .map(|c| (c.population.to_string(), c.percent))
                    .collect::<Breakdown>()
            });
        }

        let fitted: Vec<f64> = batch
            .entries
            .iter()
            .filter_map(|e| e.outcome.result())
            .map(|r| r.p_value)
            .collect();
        let quality_metrics = QualityMetrics {
            total_models_tested: batch.len(),
            successful_models: fitted.len(),
            excellent_fits: fitted
                .iter()
                .filter(|&&p| FitQuality::from_p_value(p) == FitQuality::Excellent)
                .count(),
            good_fits: fitted
                .iter()
                .filter(|&&p| FitQuality::from_p_value(p) == FitQuality::Good)
                .count(),
            average_pvalue: if fitted.is_empty() {
                None
            } else {
                Some(fitted.iter().sum::<f64>() / fitted.len() as f64)
            },
        };

        let skipped = batch
            .skipped()
            .into_iter()
            .map(|(label, reason)| SkippedModel {
                label: label.to_string(),
                reason: reason.clone(),
            })
            .collect();

        Self {
            sample_id: sample_id.to_string(),
            analysis: analysis.to_string(),
            generated: chrono::Utc::now().to_rfc3339(),
            threshold: ranking.threshold,
            outcome: ranking.outcome(),
            ancestry_breakdowns,
            statistical_models,
            quality_metrics,
            skipped,
        }
    }

    /// The best accepted model.
    pub fn best(&self) -> Option<&ModelSummary> {
        self.statistical_models.first()
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a report written by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON report from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write accepted models as TSV, one row per model and source.
    pub fn write_tsv<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(
            writer,
            "rank\tlabel\tgroup\tp_value\tquality\tsource\tpercent\tstd_error\tci_lower\tci_upper"
        )?;
        for model in &self.statistical_models {
            for c in &model.components {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{:.2e}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
                    model.rank,
                    model.label,
                    model.group.as_deref().unwrap_or("NA"),
                    model.p_value,
                    model.quality.name(),
                    c.population,
                    c.percent,
                    c.std_error,
                    c.ci_lower,
                    c.ci_upper
                )?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Write accepted models to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_tsv(BufWriter::new(file))
    }

    /// Render as TSV text.
    pub fn tsv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_tsv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl fmt::Display for AncestryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ancestry Report: {}", self.sample_id)?;
        writeln!(f, "=================")?;
        writeln!(f, "Analysis: {}", self.analysis)?;
        writeln!(f, "Generated: {}", self.generated)?;
        writeln!(f)?;

        let m = &self.quality_metrics;
        writeln!(f, "Models tested:    {}", m.total_models_tested)?;
        writeln!(f, "Successful:       {}", m.successful_models)?;
        writeln!(f, "Excellent (p>0.05): {}", m.excellent_fits)?;
        writeln!(f, "Good (p>0.01):      {}", m.good_fits)?;
        match m.average_pvalue {
            Some(p) => writeln!(f, "Average p-value:  {:.4}", p)?,
            None => writeln!(f, "Average p-value:  NA")?,
        }
        writeln!(f)?;

        if self.statistical_models.is_empty() {
            writeln!(f, "Result: {} (p > {})", self.outcome, self.threshold)?;
        }

        for (group, breakdown) in &self.ancestry_breakdowns {
            writeln!(f, "{}:", group)?;
            let mut parts: Vec<(&String, &f64)> = breakdown.iter().collect();
            parts.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (population, percent) in parts {
                writeln!(f, "  {:<28} {:>6.1}%", population, percent)?;
            }
        }

        if !self.statistical_models.is_empty() {
            writeln!(f)?;
            writeln!(f, "Accepted models (p > {}):", self.threshold)?;
            for model in &self.statistical_models {
                writeln!(
                    f,
                    "{:>3}. {} (p = {:.4}, {})",
                    model.rank, model.label, model.p_value, model.quality
                )?;
                for c in &model.components {
                    writeln!(
                        f,
                        "       {:<28} {:>6.1}% ± {:>4.1}%  [{:.1}% - {:.1}%]",
                        c.population, c.percent, c.std_error, c.ci_lower, c.ci_upper
                    )?;
                }
                for s in &model.substitutions {
                    writeln!(f, "       ({} used for {})", s.replacement, s.original)?;
                }
            }
        }

        if !self.skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped models:")?;
            for s in &self.skipped {
                writeln!(f, "  {}: {}", s.label, s.reason)?;
            }
        }
        Ok(())
    }
}
