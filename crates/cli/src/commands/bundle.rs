//! `rcp bundle` - resolve a recipe and generate deployment artifacts

use std::path::Path;

use anyhow::{bail, Result};
use recipe_lib::builder::{BuildOptions, RecipeBuilder};
use recipe_lib::bundler::{self, MakeOptions};
use recipe_lib::deployer::{DeployerConfig, DeployerRegistry, DeployerType};
use recipe_lib::store::RecipeStore;
use tokio_util::sync::CancellationToken;

use super::CriteriaArgs;
use crate::output::{self, OutputFormat};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    criteria_args: &CriteriaArgs,
    output_dir: &Path,
    deployers: &[String],
    parallel: bool,
    fail_fast: bool,
    dry_run: bool,
    checksums: bool,
    namespace: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let criteria = criteria_args.resolve()?;

    let deployer_types = deployers
        .iter()
        .map(|s| s.parse::<DeployerType>())
        .collect::<recipe_lib::Result<Vec<_>>>()?;

    let store = RecipeStore::embedded()?;
    let builder = RecipeBuilder::new(store);
    let token = CancellationToken::new();

    let recipe = builder.build(
        &token,
        &criteria,
        &BuildOptions {
            include_context: false,
            generated_at: None,
        },
    )?;

    let registry = DeployerRegistry::with_builtins();
    let options = MakeOptions {
        deployer_types,
        parallel,
        fail_fast,
        dry_run,
        checksums,
        config: DeployerConfig {
            namespace,
            ..Default::default()
        },
    };

    let result = bundler::make(&token, &registry, &recipe, output_dir, options).await?;
    let failed = !result.errors.is_empty();

    output::print_bundle_output(&result, format)?;

    if failed {
        bail!("{} deployer(s) failed", result.errors.len());
    }
    if !dry_run {
        output::print_success(&format!("Bundle written to {}", output_dir.display()));
    }
    Ok(())
}
