//! Bundle orchestration
//!
//! [`make`] validates a recipe, selects deployers from the registry,
//! executes them sequentially or concurrently, and aggregates per-deployer
//! outcomes. Each deployer writes into its own subdirectory of the output
//! directory so concurrent execution never contends on a path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checksum;
use crate::deployer::{Deployer, DeployerConfig, DeployerRegistry, DeployerType};
use crate::error::{RecipeError, Result};
use crate::model::RecipeResult;
use crate::observability::RecipeMetrics;

/// Options controlling a bundle run.
#[derive(Debug, Clone, Default)]
pub struct MakeOptions {
    /// Deployers to execute; empty means every registered deployer.
    pub deployer_types: Vec<DeployerType>,

    /// Execute deployers concurrently.
    pub parallel: bool,

    /// Stop scheduling work after the first deployer failure.
    pub fail_fast: bool,

    /// Validate and select without writing anything.
    pub dry_run: bool,

    /// Emit a checksum manifest covering every generated file.
    pub checksums: bool,

    /// Per-deployer configuration.
    pub config: DeployerConfig,
}

/// One generated file with its size.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

/// Outcome of one deployer run.
#[derive(Debug, Clone, Serialize)]
pub struct BundleResult {
    pub deployer: DeployerType,
    pub files: Vec<FileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme_content: Option<String>,
    pub duration: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BundleResult {
    fn failed(deployer: DeployerType, duration: Duration, error: &RecipeError) -> Self {
        Self {
            deployer,
            files: Vec::new(),
            readme_content: None,
            duration,
            success: false,
            error: Some(error.to_string()),
        }
    }

    /// Total bytes across this deployer's files.
    pub fn size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// A recorded deployer failure.
#[derive(Debug, Clone, Serialize)]
pub struct BundleError {
    pub deployer: DeployerType,
    pub message: String,
    pub retryable: bool,
}

/// Aggregated outcome of a bundle run.
#[derive(Debug, Serialize)]
pub struct BundleOutput {
    pub results: Vec<BundleResult>,
    pub errors: Vec<BundleError>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub total_files: usize,
    pub total_size: u64,
    pub duration: Duration,
    pub output_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_file: Option<PathBuf>,
}

impl BundleOutput {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} deployer(s), {} file(s), {} byte(s), {} error(s)",
            self.results.len(),
            self.total_files,
            self.total_size,
            self.errors.len()
        )
    }
}

/// Generate bundles for `recipe` into `output_dir`.
///
/// Deployer failures are recorded in the output and do not abort the run
/// unless `fail_fast` is set; infrastructure failures (validation, no
/// deployer selected, cancellation, output directory I/O) surface as
/// errors.
pub async fn make(
    token: &CancellationToken,
    registry: &DeployerRegistry,
    recipe: &RecipeResult,
    output_dir: &Path,
    options: MakeOptions,
) -> Result<BundleOutput> {
    let start = Instant::now();

    if recipe.measurements.is_empty() {
        return Err(RecipeError::Validation("recipe has no measurements".into()));
    }

    let requested = if options.deployer_types.is_empty() {
        registry.types()
    } else {
        options.deployer_types.clone()
    };

    let mut warnings = Vec::new();
    let mut selected: Vec<(DeployerType, Box<dyn Deployer>)> = Vec::new();
    for deployer_type in &requested {
        match registry.get(*deployer_type) {
            Some(mut deployer) => {
                deployer.configure(&options.config)?;
                selected.push((*deployer_type, deployer));
            }
            None => {
                warn!(deployer = %deployer_type, "Requested deployer not registered, skipping");
                warnings.push(format!(
                    "deployer {deployer_type} is not registered, skipped"
                ));
            }
        }
    }

    if selected.is_empty() {
        return Err(match requested.first() {
            Some(deployer_type) => RecipeError::DeployerAbsent(*deployer_type),
            None => RecipeError::Registry("no deployers registered".into()),
        });
    }

    if !options.dry_run {
        fs::create_dir_all(output_dir)?;
    }

    info!(
        deployer_count = selected.len(),
        output_dir = %output_dir.display(),
        parallel = options.parallel,
        dry_run = options.dry_run,
        "Starting bundle generation"
    );

    let recipe = Arc::new(recipe.clone());
    let mut output = BundleOutput {
        results: Vec::with_capacity(selected.len()),
        errors: Vec::new(),
        warnings,
        total_files: 0,
        total_size: 0,
        duration: Duration::ZERO,
        output_dir: output_dir.to_path_buf(),
        checksum_file: None,
    };

    if options.parallel {
        run_parallel(token, selected, &recipe, output_dir, &options, &mut output).await?;
    } else {
        run_sequential(token, selected, &recipe, output_dir, &options, &mut output).await?;
    }

    for result in &output.results {
        if result.success {
            output.total_files += result.files.len();
            output.total_size += result.size();
        }
    }

    if options.checksums && !options.dry_run {
        let files: Vec<PathBuf> = output
            .results
            .iter()
            .filter(|r| r.success)
            .flat_map(|r| r.files.iter().map(|f| f.path.clone()))
            .collect();
        let manifest = checksum::write_checksums(token, output_dir, &files)?;
        output.total_size += fs::metadata(&manifest)?.len();
        output.total_files += 1;
        output.checksum_file = Some(manifest);
    }

    output.duration = start.elapsed();
    info!(summary = %output.summary(), "Bundle generation complete");

    Ok(output)
}

async fn run_sequential(
    token: &CancellationToken,
    selected: Vec<(DeployerType, Box<dyn Deployer>)>,
    recipe: &Arc<RecipeResult>,
    output_dir: &Path,
    options: &MakeOptions,
    output: &mut BundleOutput,
) -> Result<()> {
    for (deployer_type, deployer) in selected {
        if token.is_cancelled() {
            return Err(RecipeError::Cancelled);
        }

        let bundle_dir = output_dir.join(deployer_type.as_str());
        let (result, failure) = execute_deployer(
            token,
            deployer_type,
            deployer,
            recipe.clone(),
            bundle_dir,
            options.dry_run,
        )
        .await;
        output.results.push(result);

        if let Some(err) = failure {
            if matches!(err, RecipeError::Cancelled) {
                return Err(RecipeError::Cancelled);
            }
            output.errors.push(BundleError {
                deployer: deployer_type,
                message: err.to_string(),
                retryable: err.retryable(),
            });
            if options.fail_fast {
                warn!(deployer = %deployer_type, "Failing fast after deployer error");
                break;
            }
        }
    }
    Ok(())
}

async fn run_parallel(
    token: &CancellationToken,
    selected: Vec<(DeployerType, Box<dyn Deployer>)>,
    recipe: &Arc<RecipeResult>,
    output_dir: &Path,
    options: &MakeOptions,
    output: &mut BundleOutput,
) -> Result<()> {
    // Children observe the parent token and fail-fast cancellation.
    let child = token.child_token();

    let mut handles = Vec::with_capacity(selected.len());
    for (deployer_type, deployer) in selected {
        let task_token = child.clone();
        let task_recipe = recipe.clone();
        let bundle_dir = output_dir.join(deployer_type.as_str());
        let dry_run = options.dry_run;

        handles.push((
            deployer_type,
            tokio::spawn(async move {
                execute_deployer(
                    &task_token,
                    deployer_type,
                    deployer,
                    task_recipe,
                    bundle_dir,
                    dry_run,
                )
                .await
            }),
        ));
    }

    let fail_fast = options.fail_fast;
    for (deployer_type, handle) in handles {
        let (result, failure) = handle
            .await
            .map_err(|e| RecipeError::Render(format!("deployer task panicked: {e}")))?;
        output.results.push(result);

        if let Some(err) = failure {
            if matches!(err, RecipeError::Cancelled) && token.is_cancelled() {
                return Err(RecipeError::Cancelled);
            }
            output.errors.push(BundleError {
                deployer: deployer_type,
                message: err.to_string(),
                retryable: err.retryable(),
            });
            if fail_fast {
                child.cancel();
            }
        }
    }
    Ok(())
}

/// Run one deployer, returning its result and the failure (if any) for
/// the error ledger.
async fn execute_deployer(
    token: &CancellationToken,
    deployer_type: DeployerType,
    deployer: Box<dyn Deployer>,
    recipe: Arc<RecipeResult>,
    bundle_dir: PathBuf,
    dry_run: bool,
) -> (BundleResult, Option<RecipeError>) {
    let start = Instant::now();
    let metrics = RecipeMetrics::new();

    debug!(deployer = %deployer_type, dir = %bundle_dir.display(), "Executing deployer");

    if token.is_cancelled() {
        let err = RecipeError::Cancelled;
        return (
            BundleResult::failed(deployer_type, start.elapsed(), &err),
            Some(err),
        );
    }

    if let Err(err) = deployer.validate(&recipe) {
        error!(deployer = %deployer_type, error = %err, "Deployer validation failed");
        metrics.observe_bundle(deployer_type.as_str(), start.elapsed().as_secs_f64(), false);
        return (
            BundleResult::failed(deployer_type, start.elapsed(), &err),
            Some(err),
        );
    }

    if dry_run {
        return (
            BundleResult {
                deployer: deployer_type,
                files: Vec::new(),
                readme_content: None,
                duration: start.elapsed(),
                success: true,
                error: None,
            },
            None,
        );
    }

    if let Err(err) = fs::create_dir_all(&bundle_dir) {
        let err = RecipeError::Io(err);
        return (
            BundleResult::failed(deployer_type, start.elapsed(), &err),
            Some(err),
        );
    }

    match deployer.generate(token, &recipe, &bundle_dir).await {
        Ok(artifacts) => {
            let mut files = Vec::with_capacity(artifacts.files.len());
            for path in artifacts.files {
                let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                files.push(FileEntry { path, size });
            }

            let result = BundleResult {
                deployer: deployer_type,
                files,
                readme_content: artifacts.readme_content,
                duration: start.elapsed(),
                success: true,
                error: None,
            };

            metrics.observe_bundle(deployer_type.as_str(), start.elapsed().as_secs_f64(), true);
            metrics.set_bundle_size(
                deployer_type.as_str(),
                result.files.len() as i64,
                result.size() as i64,
            );
            info!(
                deployer = %deployer_type,
                files = result.files.len(),
                size_bytes = result.size(),
                "Deployer completed"
            );

            (result, None)
        }
        Err(err) => {
            error!(deployer = %deployer_type, error = %err, "Deployer failed");
            metrics.observe_bundle(deployer_type.as_str(), start.elapsed().as_secs_f64(), false);
            (
                BundleResult::failed(deployer_type, start.elapsed(), &err),
                Some(err),
            )
        }
    }
}
