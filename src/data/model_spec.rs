//! Admixture model specifications.

use crate::data::Population;
use crate::error::{AdmixError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One qpAdm model: a target explained as a mixture of ordered sources,
/// constrained by a set of outgroups.
///
/// Source order fixes the order weights are reported in. Outgroups are a set;
/// their order is kept only so the solver sees them as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name used in reports.
    pub label: String,
    /// Population being modelled.
    pub target: Population,
    /// Candidate ancestral populations.
    pub sources: Vec<Population>,
    /// Reference ("right") populations.
    pub outgroups: Vec<Population>,
    /// Optional grouping (e.g. a period such as `Bronze_Age`) used in reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ModelSpec {
    /// Create a new model specification.
    pub fn new<S, P, O>(label: &str, target: &str, sources: S, outgroups: O) -> Self
    where
        S: IntoIterator<Item = P>,
        O: IntoIterator<Item = P>,
        P: Into<Population>,
    {
        Self {
            label: label.to_string(),
            target: Population::from(target),
            sources: sources.into_iter().map(Into::into).collect(),
            outgroups: outgroups.into_iter().map(Into::into).collect(),
            group: None,
        }
    }

    /// Assign the model to a report group.
    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    /// Number of sources (the model's "way").
    pub fn n_way(&self) -> usize {
        self.sources.len()
    }

    /// All populations the model references: target, then sources, then outgroups.
    pub fn populations(&self) -> impl Iterator<Item = &Population> {
        std::iter::once(&self.target)
            .chain(self.sources.iter())
            .chain(self.outgroups.iter())
    }

    /// Check the structural invariants the solver relies on.
    ///
    /// Sources must be non-empty and free of duplicates; target, sources and
    /// outgroups must be pairwise disjoint. An empty outgroup set is allowed.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(self.invalid("no source populations"));
        }

        let mut sources = HashSet::with_capacity(self.sources.len());
        for source in &self.sources {
            if !sources.insert(source) {
                return Err(self.invalid(&format!("duplicate source '{}'", source)));
            }
        }

        if sources.contains(&self.target) {
            return Err(self.invalid(&format!("target '{}' is also a source", self.target)));
        }

        let mut outgroups = HashSet::with_capacity(self.outgroups.len());
        for outgroup in &self.outgroups {
            if !outgroups.insert(outgroup) {
                return Err(self.invalid(&format!("duplicate outgroup '{}'", outgroup)));
            }
            if *outgroup == self.target {
                return Err(self.invalid(&format!("target '{}' is also an outgroup", outgroup)));
            }
            if sources.contains(outgroup) {
                return Err(self.invalid(&format!(
                    "'{}' is both a source and an outgroup",
                    outgroup
                )));
            }
        }

        Ok(())
    }

    fn invalid(&self, reason: &str) -> AdmixError {
        AdmixError::InvalidModelSpec {
            label: self.label.clone(),
            reason: reason.to_string(),
        }
    }
}
