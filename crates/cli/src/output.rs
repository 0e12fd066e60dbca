//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use recipe_lib::bundler::BundleOutput;
use recipe_lib::model::RecipeResult;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "VERSION")]
    version: String,
    #[tabled(rename = "TYPE")]
    component_type: String,
    #[tabled(rename = "DEPENDS ON")]
    depends_on: String,
}

#[derive(Tabled)]
struct BundleRow {
    #[tabled(rename = "DEPLOYER")]
    deployer: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "FILES")]
    files: usize,
    #[tabled(rename = "SIZE")]
    size: String,
}

/// Print a resolved recipe in the requested format.
pub fn print_recipe(result: &RecipeResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(result)?,
        OutputFormat::Yaml => print_yaml(result)?,
        OutputFormat::Table => {
            println!("Recipe version:  {}", result.metadata.version);
            println!(
                "Generated at:    {}",
                result.metadata.generated_at.to_rfc3339()
            );
            println!("Criteria:        {}", result.criteria);
            println!(
                "Overlays:        {}",
                if result.matched_overlay_ids.is_empty() {
                    "(none)".to_string()
                } else {
                    result.matched_overlay_ids.join(", ")
                }
            );
            println!("Deploy order:    {}", result.deployment_order.join(" -> "));
            println!();

            let rows: Vec<ComponentRow> = result
                .component_refs
                .iter()
                .map(|c| ComponentRow {
                    name: c.name.clone(),
                    version: c.version.clone(),
                    component_type: format!("{:?}", c.component_type),
                    depends_on: if c.dependency_refs.is_empty() {
                        "-".to_string()
                    } else {
                        c.dependency_refs.join(", ")
                    },
                })
                .collect();
            print_table(&rows);

            for warning in &result.warnings {
                print_warning(warning);
            }
        }
    }
    Ok(())
}

/// Print a bundle run summary in the requested format.
pub fn print_bundle_output(output: &BundleOutput, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(output)?,
        OutputFormat::Yaml => print_yaml(output)?,
        OutputFormat::Table => {
            let rows: Vec<BundleRow> = output
                .results
                .iter()
                .map(|r| BundleRow {
                    deployer: r.deployer.to_string(),
                    status: if r.success {
                        "ok".green().to_string()
                    } else {
                        "failed".red().to_string()
                    },
                    files: r.files.len(),
                    size: format_bytes(r.size()),
                })
                .collect();
            print_table(&rows);

            println!();
            println!("Output dir:  {}", output.output_dir.display());
            println!(
                "Totals:      {} file(s), {}",
                output.total_files,
                format_bytes(output.total_size)
            );

            for warning in &output.warnings {
                print_warning(warning);
            }
            for error in &output.errors {
                print_error(&format!("{}: {}", error.deployer, error.message));
            }
        }
    }
    Ok(())
}

/// Print a table from a list of rows.
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_yaml<T: Serialize>(value: &T) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2}GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2}MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2}KiB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}
