//! Analysis configuration.
//!
//! Population lists, outgroup sets, substitutions and solver settings are
//! loaded from YAML and turned into [`ModelSpec`]s for one target.

use crate::data::{ModelSpec, Population, SubstitutionTable};
use crate::error::{AdmixError, Result};
use crate::rank::DEFAULT_THRESHOLD;
use crate::solver::SolverOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One configured model, before the target and outgroups are filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name.
    pub label: String,
    /// Report group (e.g. a period such as `Bronze_Age`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Ordered source populations.
    pub sources: Vec<Population>,
    /// Name of an entry in `outgroup_sets`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outgroups: Option<String>,
    /// Outgroups added to (or used instead of) the named set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_outgroups: Vec<Population>,
}

/// A complete analysis: one target, many models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Name of the analysis.
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target sample or population.
    pub target: Population,
    /// Acceptance threshold for ranking.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Named outgroup sets shared between models.
    #[serde(default)]
    pub outgroup_sets: BTreeMap<String, Vec<Population>>,
    /// Fallbacks for populations that may be missing.
    #[serde(default)]
    pub substitutions: SubstitutionTable,
    /// Models to fit, in report order.
    pub models: Vec<ModelConfig>,
    /// Solver settings.
    #[serde(default)]
    pub solver: SolverOptions,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl AnalysisConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(AdmixError::from)
    }

    /// Replace the target, e.g. from the command line.
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Population::from(target);
        self
    }

    fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(AdmixError::Config(format!(
                "threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        if self.models.is_empty() {
            return Err(AdmixError::Config("no models configured".to_string()));
        }
        let mut labels = std::collections::HashSet::new();
        for model in &self.models {
            if !labels.insert(model.label.as_str()) {
                return Err(AdmixError::Config(format!(
                    "duplicate model label '{}'",
                    model.label
                )));
            }
            let clashes = self
                .models
                .iter()
                .any(|m| m.group.as_deref() == Some(model.label.as_str()));
            if model.group.is_none() && clashes {
                return Err(AdmixError::Config(format!(
                    "ungrouped model '{}' has the same name as a group",
                    model.label
                )));
            }
            if let Some(set) = &model.outgroups {
                if !self.outgroup_sets.contains_key(set) {
                    return Err(AdmixError::Config(format!(
                        "model '{}' refers to unknown outgroup set '{}'",
                        model.label, set
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve every model into a [`ModelSpec`] for the configured target.
    ///
    /// Outgroups are the named set followed by any extras, without repeats.
    pub fn model_specs(&self) -> Result<Vec<ModelSpec>> {
        self.models
            .iter()
            .map(|model| -> Result<ModelSpec> {
                let mut outgroups: Vec<Population> = match &model.outgroups {
                    Some(set) => self
                        .outgroup_sets
                        .get(set)
                        .cloned()
                        .ok_or_else(|| {
                            AdmixError::Config(format!("unknown outgroup set '{}'", set))
                        })?,
                    None => Vec::new(),
                };
                for extra in &model.extra_outgroups {
                    if !outgroups.contains(extra) {
                        outgroups.push(extra.clone());
                    }
                }
                Ok(ModelSpec {
                    label: model.label.clone(),
                    target: self.target.clone(),
                    sources: model.sources.clone(),
                    outgroups,
                    group: model.group.clone(),
                })
            })
            .collect()
    }

    /// Every population the configuration mentions, target first, without repeats.
    pub fn populations(&self) -> Vec<Population> {
        let mut seen = std::collections::HashSet::new();
        std::iter::once(&self.target)
            .chain(self.models.iter().flat_map(|m| m.sources.iter().chain(m.extra_outgroups.iter())))
            .chain(self.outgroup_sets.values().flatten())
            .filter(|p| seen.insert((*p).clone()))
            .cloned()
            .collect()
    }

    /// Template configuration written by `admix example`.
    pub fn example() -> Self {
        fn pops(names: &[&str]) -> Vec<Population> {
            names.iter().map(|&n| Population::from(n)).collect()
        }

        fn model(label: &str, group: &str, sources: &[&str]) -> ModelConfig {
            ModelConfig {
                label: label.to_string(),
                group: Some(group.to_string()),
                sources: pops(sources),
                outgroups: Some("core".to_string()),
                extra_outgroups: Vec::new(),
            }
        }

        let mut outgroup_sets = BTreeMap::new();
        outgroup_sets.insert(
            "core".to_string(),
            pops(&[
                "Mbuti.DG",
                "Russia_Ust_Ishim.DG",
                "Russia_Kostenki14",
                "Papuan.DG",
                "Han.DG",
                "Karitiana.DG",
                "Turkey_Boncuklu_N",
                "Morocco_Iberomaurusian",
            ]),
        );

        let substitutions = SubstitutionTable::new()
            .with("Iran_GanjDareh_N", "Iran_N")
            .with("Russia_Sintashta_MLBA", "Steppe_MLBA")
            .with("India_Andamanese", "Onge.DG");

        Self {
            name: "south_asia_core".to_string(),
            description: Some("Bronze Age and Iron Age source models".to_string()),
            target: Population::from("Sample1"),
            threshold: DEFAULT_THRESHOLD,
            outgroup_sets,
            substitutions,
            models: vec![
                model(
                    "Iran_Steppe_AASI",
                    "Bronze_Age",
                    &["Iran_GanjDareh_N", "Russia_Sintashta_MLBA", "India_Andamanese"],
                ),
                model(
                    "Turan_Steppe_AASI",
                    "Bronze_Age",
                    &["Turkmenistan_Gonur_BA", "Russia_Sintashta_MLBA", "India_Andamanese"],
                ),
                model(
                    "Saka_Iran",
                    "Iron_Age",
                    &["Kazakhstan_Saka_IA", "Iran_Hasanlu_IA"],
                ),
            ],
            solver: SolverOptions::default(),
        }
    }
}
