//! ADMIXTOOLS 2 `qpadm()` driven through `Rscript`.
//!
//! Every fit runs a short R script against a precomputed f2 directory and
//! reads back a JSON object on stdout. Full output is always requested so
//! the jackknife standard errors are present.

use crate::data::{Population, PopulationCatalog};
use crate::error::{AdmixError, Result};
use crate::solver::{Dataset, SolverOptions, SolverOutput};
use log::debug;
use serde::Deserialize;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const QPADM_SCRIPT: &str = r#"
suppressPackageStartupMessages({
  library(admixtools)
  library(jsonlite)
})
args <- commandArgs(trailingOnly = TRUE)
f2_dir <- args[1]
target <- args[2]
left <- strsplit(args[3], ",", fixed = TRUE)[[1]]
right <- if (nchar(args[4]) > 0) strsplit(args[4], ",", fixed = TRUE)[[1]] else character(0)
allsnps <- as.logical(args[5])
res <- tryCatch(
  qpadm(f2_dir, left, right, target, allsnps = allsnps, verbose = FALSE),
  error = function(e) {
    cat(toJSON(list(error = conditionMessage(e)), auto_unbox = TRUE))
    quit(save = "no", status = 0)
  }
)
w <- res$weights
idx <- match(left, w$left)
out <- list(
  weights = w$weight[idx],
  std_errors = if ("se" %in% names(w)) w$se[idx] else rep(NA_real_, length(left)),
  p_value = res$popdrop$p[1]
)
cat(toJSON(out, auto_unbox = FALSE, digits = NA, na = "null"))
"#;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct ScriptOutput {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    weights: Vec<Option<f64>>,
    #[serde(default)]
    std_errors: Option<Vec<Option<f64>>>,
    #[serde(default)]
    p_value: Option<Vec<Option<f64>>>,
}

impl ScriptOutput {
    fn into_solver_output(self) -> Result<SolverOutput> {
        if let Some(message) = self.error {
            return Err(AdmixError::Solver(message));
        }
        let weights: Option<Vec<f64>> = self.weights.into_iter().collect();
        let weights =
            weights.ok_or_else(|| AdmixError::Solver("qpadm returned NA weights".to_string()))?;
        let p_value = self
            .p_value
            .and_then(|p| p.into_iter().next().flatten())
            .ok_or_else(|| AdmixError::Solver("qpadm returned no p-value".to_string()))?;
        // Any NA standard error means the jackknife did not run for this model.
        let std_errors = self
            .std_errors
            .and_then(|se| se.into_iter().collect::<Option<Vec<f64>>>());
        Ok(SolverOutput {
            weights,
            std_errors,
            p_value,
        })
    }
}

/// A dataset held as an ADMIXTOOLS 2 f2 directory.
#[derive(Debug, Clone)]
pub struct RscriptDataset {
    f2_dir: PathBuf,
    rscript: PathBuf,
    catalog: PopulationCatalog,
}

impl RscriptDataset {
    /// Open an f2 directory, taking the catalog from its per-population subdirectories.
    pub fn open<P: AsRef<Path>>(f2_dir: P) -> Result<Self> {
        let f2_dir = f2_dir.as_ref().to_path_buf();
        let catalog = catalog_from_f2_dir(&f2_dir)?;
        Ok(Self::with_catalog(f2_dir, catalog))
    }

    /// Use an f2 directory with an externally supplied catalog (e.g. from the `.ind` file).
    pub fn with_catalog<P: AsRef<Path>>(f2_dir: P, catalog: PopulationCatalog) -> Self {
        Self {
            f2_dir: f2_dir.as_ref().to_path_buf(),
            rscript: PathBuf::from("Rscript"),
            catalog,
        }
    }

    /// Use a specific `Rscript` binary.
    pub fn rscript(mut self, path: impl Into<PathBuf>) -> Self {
        self.rscript = path.into();
        self
    }

    fn run_script(&self, args: &[String], timeout: Option<Duration>) -> Result<String> {
        let mut script = tempfile::Builder::new()
            .prefix("qpadm_")
            .suffix(".R")
            .tempfile()?;
        script.write_all(QPADM_SCRIPT.as_bytes())?;
        script.flush()?;

        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;

        let mut child = Command::new(&self.rscript)
            .arg("--vanilla")
            .arg(script.path())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| {
                AdmixError::Solver(format!(
                    "failed to start {}: {}",
                    self.rscript.display(),
                    e
                ))
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AdmixError::Solver(format!(
                        "qpadm timed out after {}s",
                        limit.as_secs()
                    )));
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut out = String::new();
        stdout.seek(SeekFrom::Start(0))?;
        stdout.read_to_string(&mut out)?;

        if !status.success() {
            let mut err = String::new();
            stderr.seek(SeekFrom::Start(0))?;
            stderr.read_to_string(&mut err)?;
            return Err(AdmixError::Solver(format!(
                "Rscript exited with {}: {}",
                status,
                err.trim()
            )));
        }

        Ok(out)
    }
}

impl Dataset for RscriptDataset {
    fn catalog(&self) -> Result<PopulationCatalog> {
        Ok(self.catalog.clone())
    }

    fn solve(
        &self,
        target: &Population,
        sources: &[Population],
        outgroups: &[Population],
        options: &SolverOptions,
    ) -> Result<SolverOutput> {
        let args = vec![
            self.f2_dir.display().to_string(),
            target.to_string(),
            join(sources),
            join(outgroups),
            if options.allsnps { "TRUE" } else { "FALSE" }.to_string(),
        ];
        debug!("qpadm {} ~ {} | {}", args[1], args[2], args[3]);

        let stdout = self.run_script(&args, options.timeout())?;
        parse_script_output(&stdout)
    }
}

fn join(populations: &[Population]) -> String {
    populations
        .iter()
        .map(Population::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the JSON the R script prints. Anything before the first `{` is R noise.
fn parse_script_output(stdout: &str) -> Result<SolverOutput> {
    let start = stdout
        .find('{')
        .ok_or_else(|| AdmixError::Solver(format!("no JSON in qpadm output: {}", stdout.trim())))?;
    let parsed: ScriptOutput = serde_json::from_str(stdout[start..].trim())
        .map_err(|e| AdmixError::Solver(format!("unreadable qpadm output: {}", e)))?;
    parsed.into_solver_output()
}

/// List populations in an f2 directory: one subdirectory per population.
pub fn catalog_from_f2_dir(f2_dir: &Path) -> Result<PopulationCatalog> {
    let mut names = Vec::new();
    for entry in fs::read_dir(f2_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    if names.is_empty() {
        return Err(AdmixError::EmptyData(format!(
            "no population directories in {}",
            f2_dir.display()
        )));
    }
    Ok(PopulationCatalog::new(names))
}
