//! Admixture Model Orchestration Library
//!
//! This library runs batches of qpAdm admixture models against a genotype
//! dataset and ranks the fits. The statistics themselves are delegated to an
//! external solver; this crate decides which models can be run, substitutes
//! missing populations, records failures, and reports the results.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (Population, ModelSpec, ModelResult)
//! - **solver**: The `Dataset` seam and its implementations
//! - **runner**: Population checks, substitution, batch execution
//! - **rank**: Threshold filtering, ranking, confidence intervals
//! - **report**: Ancestry reports in JSON, text and TSV
//! - **config**: YAML analysis configuration
//!
//! # Example
//!
//! ```no_run
//! use admix_models::prelude::*;
//!
//! let config = AnalysisConfig::from_file("analysis.yaml").unwrap();
//! let dataset = PrecomputedDataset::from_tsv("fits.tsv", None).unwrap();
//!
//! let runner = ModelRunner::new(&dataset)
//!     .unwrap()
//!     .substitutions(config.substitutions.clone())
//!     .options(config.solver.clone());
//! let batch = runner.run_batch(&config.model_specs().unwrap()).unwrap();
//!
//! let ranking = rank(batch.results(), config.threshold).unwrap();
//! let report = AncestryReport::new(config.target.as_str(), &config.name, &batch, &ranking);
//! println!("{}", report);
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod rank;
pub mod report;
pub mod runner;
pub mod solver;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::config::{AnalysisConfig, ModelConfig};
    pub use crate::data::{
        CatalogFormat, FitQuality, ModelResult, ModelSpec, Population, PopulationCatalog,
        SourceEstimate, Substitution, SubstitutionTable,
    };
    pub use crate::error::{AdmixError, Result};
    pub use crate::rank::{
        confidence_interval, rank, RankedEntry, RankedReport, RankingOutcome, DEFAULT_THRESHOLD,
    };
    pub use crate::report::{AncestryReport, ModelSummary, QualityMetrics};
    pub use crate::runner::{BatchEntry, BatchResult, ModelRunner, RunOutcome, SkipReason};
    pub use crate::solver::{
        Dataset, PrecomputedDataset, PrecomputedFit, RscriptDataset, SolverOptions, SolverOutput,
    };
}
