//! Integration tests for a configured analysis run end to end.

use admix_models::prelude::*;
use approx::assert_relative_eq;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
name: integration
target: S1
threshold: 0.05
outgroup_sets:
  core: [Mbuti.DG, Han.DG, Papuan.DG]
substitutions:
  Iran_GanjDareh_N: Iran_N
  India_Andamanese: Onge.DG
  Turkmenistan_Gonur_BA: Turkmenistan_Gonur_BA_2
models:
  - label: iran_steppe_aasi
    group: Bronze_Age
    sources: [Iran_GanjDareh_N, Steppe_MLBA, AASI]
    outgroups: core
  - label: iran_steppe_onge
    group: Bronze_Age
    sources: [Iran_N, Steppe_MLBA, India_Andamanese]
    outgroups: core
  - label: saka_aasi
    group: Iron_Age
    sources: [Kazakhstan_Saka_IA, AASI]
    outgroups: core
  - label: gonur_aasi
    group: Bronze_Age
    sources: [Turkmenistan_Gonur_BA, AASI]
    outgroups: core
  - label: iran_aasi
    sources: [Iran_N, AASI]
    outgroups: core
  - label: collapsed
    sources: [Iran_GanjDareh_N, Iran_N]
    outgroups: core
"#;

const CATALOG: &str = "\
# populations present in the dataset
S1
Iran_N
Steppe_MLBA
AASI
Onge.DG
Kazakhstan_Saka_IA
Mbuti.DG
Han.DG
Papuan.DG
";

/// Fits as exported from a finished run. Outgroup order differs from the
/// configuration on purpose.
const FITS: &str = "\
target\tsources\toutgroups\tweights\tstd_errors\tp_value\terror
S1\tIran_N,Steppe_MLBA,AASI\tPapuan.DG,Mbuti.DG,Han.DG\t0.40,0.20,0.40\t0.05,0.04,0.03\t0.12\t
S1\tIran_N,Steppe_MLBA,Onge.DG\tMbuti.DG,Han.DG,Papuan.DG\t0.45,0.15,0.40\t0.04,0.03,0.03\t0.30\t
S1\tKazakhstan_Saka_IA,AASI\tMbuti.DG,Han.DG,Papuan.DG\t0.70,0.30\t0.06,0.06\t0.02\t
S1\tIran_N,AASI\tMbuti.DG,Han.DG,Papuan.DG\t\t\t\tsingular covariance
";

fn write_temp(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn dataset() -> PrecomputedDataset {
    let fits = write_temp(FITS, ".tsv");
    let catalog = PopulationCatalog::from_file(write_temp(CATALOG, ".txt").path()).unwrap();
    PrecomputedDataset::from_tsv(fits.path(), Some(catalog)).unwrap()
}

fn run(config: &AnalysisConfig, dataset: &PrecomputedDataset) -> (BatchResult, RankedReport) {
    let runner = ModelRunner::new(dataset)
        .unwrap()
        .substitutions(config.substitutions.clone())
        .options(config.solver.clone());
    let batch = runner.run_batch(&config.model_specs().unwrap()).unwrap();
    let ranking = rank(batch.results(), config.threshold).unwrap();
    (batch, ranking)
}

#[test]
fn test_full_analysis() {
    let config = AnalysisConfig::from_yaml(CONFIG).unwrap();
    let dataset = dataset();
    let (batch, ranking) = run(&config, &dataset);

    assert_eq!(batch.len(), 6);
    assert_eq!(batch.n_fitted(), 3);

    // Ranked by p-value; saka_aasi (p = 0.02) falls below the threshold.
    let labels: Vec<&str> = ranking.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["iran_steppe_onge", "iran_steppe_aasi"]);
    assert_eq!(ranking.outcome(), RankingOutcome::BestModel);

    let best = ranking.best().unwrap();
    assert_eq!(best.result.sources[2].population.as_str(), "Onge.DG");
    assert_eq!(best.result.substitutions.len(), 1);
    assert_eq!(best.result.quality, FitQuality::Excellent);

    let substituted = &ranking.entries[1].result;
    assert_eq!(substituted.sources[0].population.as_str(), "Iran_N");
    assert_eq!(substituted.substitutions[0].original.as_str(), "Iran_GanjDareh_N");
}

#[test]
fn test_skip_reasons() {
    let config = AnalysisConfig::from_yaml(CONFIG).unwrap();
    let dataset = dataset();
    let (batch, _) = run(&config, &dataset);

    let skipped = batch.skipped();
    let labels: Vec<&str> = skipped.iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, vec!["gonur_aasi", "iran_aasi", "collapsed"]);

    // The fallback for Gonur is itself absent, so the original stays missing.
    match skipped[0].1 {
        SkipReason::PopulationsUnavailable(missing) => {
            assert_eq!(missing, &vec![Population::from("Turkmenistan_Gonur_BA")]);
        }
        other => panic!("unexpected skip reason: {:?}", other),
    }
    match skipped[1].1 {
        SkipReason::SolverError(msg) => assert!(msg.contains("singular covariance")),
        other => panic!("unexpected skip reason: {:?}", other),
    }
    assert!(matches!(skipped[2].1, SkipReason::InvalidModelSpec(_)));
}

#[test]
fn test_report() {
    let config = AnalysisConfig::from_yaml(CONFIG).unwrap();
    let dataset = dataset();
    let (batch, ranking) = run(&config, &dataset);
    let report = AncestryReport::new(config.target.as_str(), &config.name, &batch, &ranking);

    assert_eq!(report.sample_id, "S1");
    assert_eq!(report.outcome, RankingOutcome::BestModel);

    let metrics = &report.quality_metrics;
    assert_eq!(metrics.total_models_tested, 6);
    assert_eq!(metrics.successful_models, 3);
    assert_eq!(metrics.excellent_fits, 2);
    assert_eq!(metrics.good_fits, 1);
    assert_relative_eq!(
        metrics.average_pvalue.unwrap(),
        (0.12 + 0.30 + 0.02) / 3.0,
        epsilon = 1e-12
    );

    let bronze = &report.ancestry_breakdowns["Bronze_Age"];
    assert_relative_eq!(bronze["Iran_N"], 45.0, epsilon = 1e-9);
    assert_relative_eq!(bronze["Onge.DG"], 40.0, epsilon = 1e-9);
    assert!(!report.ancestry_breakdowns.contains_key("Iron_Age"));

    let text = report.to_string();
    assert!(text.contains("iran_steppe_onge"));
    assert!(text.contains("(Onge.DG used for India_Andamanese)"));
    assert!(text.contains("collapsed: invalid model"));
}

#[test]
fn test_report_saved_and_reloaded() {
    let config = AnalysisConfig::from_yaml(CONFIG).unwrap();
    let dataset = dataset();
    let (batch, ranking) = run(&config, &dataset);
    let report = AncestryReport::new("S1", &config.name, &batch, &ranking);

    let file = write_temp(&report.to_json().unwrap(), ".json");
    let loaded = AncestryReport::from_file(file.path()).unwrap();
    assert_eq!(loaded.statistical_models.len(), 2);
    assert_eq!(loaded.skipped, report.skipped);
    assert_eq!(loaded.tsv_string().unwrap().lines().count(), 7);
}

#[test]
fn test_parallel_matches_sequential() {
    let mut config = AnalysisConfig::from_yaml(CONFIG).unwrap();
    let dataset = dataset();
    let (sequential, _) = run(&config, &dataset);

    config.solver.parallel = true;
    let (parallel, _) = run(&config, &dataset);
    assert_eq!(sequential, parallel);
}

#[test]
fn test_missing_target_aborts() {
    let config = AnalysisConfig::from_yaml(CONFIG).unwrap().with_target("S2");
    let dataset = dataset();
    let runner = ModelRunner::new(&dataset).unwrap();
    let err = runner.run_batch(&config.model_specs().unwrap()).unwrap_err();
    assert!(matches!(err, AdmixError::TargetNotFound(ref t) if t == "S2"));
}

#[test]
fn test_nothing_accepted_at_strict_threshold() {
    let mut config = AnalysisConfig::from_yaml(CONFIG).unwrap();
    config.threshold = 0.5;
    let dataset = dataset();
    let (batch, ranking) = run(&config, &dataset);

    assert!(ranking.best().is_none());
    assert_eq!(ranking.outcome(), RankingOutcome::NoAcceptableModel);

    let report = AncestryReport::new("S1", &config.name, &batch, &ranking);
    assert!(report.ancestry_breakdowns.is_empty());
    assert_eq!(report.quality_metrics.successful_models, 3);
}

#[test]
fn test_example_config_is_runnable() {
    let yaml = AnalysisConfig::example().to_yaml().unwrap();
    let config = AnalysisConfig::from_yaml(&yaml).unwrap();
    let specs = config.model_specs().unwrap();
    assert!(specs.iter().all(|s| s.validate().is_ok()));
    assert!(specs.iter().all(|s| s.outgroups.len() == 8));
}
