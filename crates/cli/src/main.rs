//! Recipe CLI
//!
//! A command-line tool for resolving GPU cluster recipes and generating
//! deployment bundles from them.

mod client;
mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use recipe_lib::error::RecipeError;

use commands::CriteriaArgs;
use output::OutputFormat;

/// GPU cluster recipe CLI
#[derive(Parser)]
#[command(name = "rcp")]
#[command(author, version, about = "CLI for the GPU cluster recipe service", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a recipe from criteria
    Recipe {
        #[command(flatten)]
        criteria: CriteriaArgs,

        /// Keep subtype context maps in the output
        #[arg(long)]
        context: bool,

        /// Fetch from a running recipe-server instead of resolving
        /// against the embedded store (can also be set via RECIPE_SERVER)
        #[arg(long, env = "RECIPE_SERVER")]
        server: Option<String>,
    },

    /// Resolve a recipe and generate deployment bundles
    Bundle {
        #[command(flatten)]
        criteria: CriteriaArgs,

        /// Output directory for the bundle
        #[arg(long, short)]
        output: PathBuf,

        /// Deployers to run (repeatable; default: all)
        #[arg(long = "deployer")]
        deployers: Vec<String>,

        /// Run deployers concurrently
        #[arg(long)]
        parallel: bool,

        /// Stop after the first deployer failure
        #[arg(long)]
        fail_fast: bool,

        /// Validate and select without writing files
        #[arg(long)]
        dry_run: bool,

        /// Write a checksums.txt covering every generated file
        #[arg(long)]
        checksums: bool,

        /// Deploy every component into this namespace
        #[arg(long)]
        namespace: Option<String>,
    },

    /// List supported criteria values
    Criteria,
}

// Exit codes: 0 success, 1 general error, 2 invalid arguments,
// 3 I/O error, 5 recipe build error.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RecipeError>() {
        Some(RecipeError::CriteriaParse(_)) => 2,
        Some(RecipeError::Io(_)) => 3,
        Some(
            RecipeError::StoreLoad(_)
            | RecipeError::UnresolvedDependency { .. }
            | RecipeError::Cycle { .. },
        ) => 5,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Recipe {
            criteria,
            context,
            server,
        } => commands::recipe::run(criteria, *context, server.as_deref(), cli.format).await,
        Commands::Bundle {
            criteria,
            output,
            deployers,
            parallel,
            fail_fast,
            dry_run,
            checksums,
            namespace,
        } => {
            commands::bundle::run(
                criteria,
                output,
                deployers,
                *parallel,
                *fail_fast,
                *dry_run,
                *checksums,
                namespace.clone(),
                cli.format,
            )
            .await
        }
        Commands::Criteria => commands::criteria::run(cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::print_error(&format!("{err:#}"));
            ExitCode::from(exit_code_for(&err))
        }
    }
}
