//! admix - qpAdm model batch CLI
//!
//! Command-line interface for running, ranking and reporting admixture models.

use admix_models::config::AnalysisConfig;
use admix_models::data::PopulationCatalog;
use admix_models::error::Result;
use admix_models::rank::rank;
use admix_models::report::AncestryReport;
use admix_models::runner::ModelRunner;
use admix_models::solver::{Dataset, PrecomputedDataset, RscriptDataset};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::path::{Path, PathBuf};

/// Report output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Full report as JSON
    Json,
    /// One row per accepted model and source
    Tsv,
}

/// qpAdm admixture model orchestration
#[derive(Parser)]
#[command(name = "admix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured model and report the ranking
    Run {
        /// Path to analysis configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// f2 directory, or a fits TSV with --precomputed
        #[arg(short, long)]
        dataset: PathBuf,

        /// Population catalog (.ind, .fam, or one name per line)
        #[arg(short, long)]
        populations: Option<PathBuf>,

        /// Override the configured target
        #[arg(short, long)]
        target: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat --dataset as a TSV of precomputed fits
        #[arg(long)]
        precomputed: bool,
    },

    /// Check configured populations against a catalog
    Check {
        /// Path to analysis configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Population catalog (.ind, .fam, or one name per line)
        #[arg(short, long)]
        populations: PathBuf,
    },

    /// Write an example analysis configuration
    Example {
        /// Output path for configuration YAML
        #[arg(short, long, default_value = "analysis.yaml")]
        output: PathBuf,
    },

    /// Re-render a saved JSON report
    Show {
        /// Path to a report written with --format json
        #[arg(short, long)]
        report: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Run {
            config,
            dataset,
            populations,
            target,
            format,
            output,
            precomputed,
        } => cmd_run(
            &config,
            &dataset,
            populations.as_deref(),
            target.as_deref(),
            format,
            output.as_deref(),
            precomputed,
        ),

        Commands::Check {
            config,
            populations,
        } => cmd_check(&config, &populations),

        Commands::Example { output } => cmd_example(&output),

        Commands::Show { report, format } => cmd_show(&report, format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_dataset(
    path: &Path,
    catalog: Option<PopulationCatalog>,
    precomputed: bool,
) -> Result<Box<dyn Dataset>> {
    if precomputed {
        return Ok(Box::new(PrecomputedDataset::from_tsv(path, catalog)?));
    }
    Ok(match catalog {
        Some(catalog) => Box::new(RscriptDataset::with_catalog(path, catalog)),
        None => Box::new(RscriptDataset::open(path)?),
    })
}

fn render(report: &AncestryReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(report.to_string()),
        OutputFormat::Json => report.to_json(),
        OutputFormat::Tsv => report.tsv_string(),
    }
}

/// Run a configured analysis
fn cmd_run(
    config_path: &Path,
    dataset_path: &Path,
    populations: Option<&Path>,
    target: Option<&str>,
    format: OutputFormat,
    output: Option<&Path>,
    precomputed: bool,
) -> Result<()> {
    let mut config = AnalysisConfig::from_file(config_path)?;
    if let Some(target) = target {
        config = config.with_target(target);
    }
    info!("Loaded analysis '{}' for target {}", config.name, config.target);

    let catalog = populations.map(PopulationCatalog::from_file).transpose()?;
    let dataset = load_dataset(dataset_path, catalog, precomputed)?;

    let runner = ModelRunner::new(dataset.as_ref())?
        .substitutions(config.substitutions.clone())
        .options(config.solver.clone());
    let batch = runner.run_batch(&config.model_specs()?)?;

    let ranking = rank(batch.results(), config.threshold)?;
    info!("{}", ranking.outcome());

    let report = AncestryReport::new(config.target.as_str(), &config.name, &batch, &ranking);
    let rendered = render(&report, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            info!("Wrote report to {:?}", path);
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

/// Report which configured populations are missing and how they resolve
fn cmd_check(config_path: &Path, populations: &Path) -> Result<()> {
    let config = AnalysisConfig::from_file(config_path)?;
    let catalog = PopulationCatalog::from_file(populations)?;
    let wanted = config.populations();
    let missing = catalog.missing(wanted.iter());

    println!("Populations referenced: {}", wanted.len());
    println!("Populations in catalog: {}", catalog.len());

    if missing.is_empty() {
        println!("All populations available.");
        return Ok(());
    }

    println!("Missing: {}", missing.len());
    for population in &missing {
        if *population == config.target {
            println!("  {:<32} TARGET (analysis cannot run)", population);
            continue;
        }
        match config.substitutions.fallback(population.as_str()) {
            Some(fallback) if catalog.contains(fallback.as_str()) => {
                println!("  {:<32} -> {}", population, fallback)
            }
            Some(fallback) => println!("  {:<32} -> {} (also missing)", population, fallback),
            None => println!("  {:<32} no substitute", population),
        }
    }

    Ok(())
}

/// Write the example configuration
fn cmd_example(output_path: &Path) -> Result<()> {
    let yaml = AnalysisConfig::example().to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example configuration to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}

/// Print a saved report in another format
fn cmd_show(report_path: &Path, format: OutputFormat) -> Result<()> {
    let report = AncestryReport::from_file(report_path)?;
    print!("{}", render(&report, format)?);
    Ok(())
}
