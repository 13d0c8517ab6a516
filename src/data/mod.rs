//! Core data structures: populations, model specifications and fitted results.

mod model_spec;
mod population;
mod result;
mod substitution;

pub use model_spec::ModelSpec;
pub use population::{CatalogFormat, Population, PopulationCatalog};
pub use result::{FitQuality, ModelResult, SourceEstimate, Substitution};
pub use substitution::SubstitutionTable;
