//! Helm deployer
//!
//! Emits an umbrella chart: `Chart.yaml` with one dependency entry per
//! component, a combined `values.yaml`, and a README. Driver and MIG
//! settings for the gpu-operator are lifted from the recipe measurements.

use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::template::{render, ComponentInfo, ReadmeData};
use super::{async_trait, write_artifact, Artifacts, Deployer, DeployerConfig};
use crate::builder::merge_values;
use crate::error::{RecipeError, Result};
use crate::measurement::MeasurementType;
use crate::model::RecipeResult;

const CHART_TEMPLATE: &str = include_str!("templates/helm_chart.yaml.hbs");
const README_TEMPLATE: &str = include_str!("templates/helm_readme.md.hbs");

/// One dependency entry in the umbrella Chart.yaml.
#[derive(Debug, Serialize)]
struct ChartDependency {
    alias: String,
    chart: String,
    version: String,
    repository: String,
}

#[derive(Debug, Serialize)]
struct ChartData {
    chart_version: String,
    recipe_version: String,
    dependencies: Vec<ChartDependency>,
}

/// Generates the Helm umbrella chart bundle.
#[derive(Debug, Default)]
pub struct HelmDeployer {
    config: DeployerConfig,
}

impl HelmDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose the combined values tree: a per-component skeleton,
    /// measurement-derived gpu-operator settings, then the recipe's own
    /// values tree merged on top.
    fn compose_values(&self, recipe: &RecipeResult) -> Value {
        let mut root = json!({
            "global": {
                "labels": self.config.labels,
            },
        });

        for component in recipe.ordered_components() {
            root[&component.name] = json!({
                "enabled": true,
                "version": component.version,
                "repository": component.source,
                "namespace": self.config.namespace_for(&component.name),
            });
        }

        if let Some(settings) = extract_gpu_operator_settings(recipe) {
            if let Some(entry) = root.get_mut("gpu-operator") {
                merge_values(entry, &settings);
            }
        }

        if let Some(values) = &recipe.values {
            merge_values(&mut root, values);
        }

        root
    }
}

/// Lift gpu-operator settings out of the recipe measurements: component
/// versions from the `K8s`/`image` subtype, flags from `K8s`/`config`,
/// and the driver version fallback from `SMI`/`smi`.
fn extract_gpu_operator_settings(recipe: &RecipeResult) -> Option<Value> {
    let k8s = recipe
        .measurements
        .iter()
        .find(|m| m.measurement_type == MeasurementType::K8s)?;

    let mut driver_version: Option<String> = None;
    let mut toolkit_version: Option<String> = None;
    let mut use_open_kernel_module = false;
    let mut mig = false;
    let mut rdma = false;

    if let Some(image) = k8s.subtype("image") {
        driver_version = image.data.get("driver").and_then(|r| r.as_str()).map(Into::into);
        toolkit_version = image
            .data
            .get("container-toolkit")
            .and_then(|r| r.as_str())
            .map(Into::into);
    }
    if let Some(config) = k8s.subtype("config") {
        use_open_kernel_module = config
            .data
            .get("useOpenKernelModule")
            .and_then(|r| r.as_bool())
            .unwrap_or(false);
        mig = config.data.get("mig").and_then(|r| r.as_bool()).unwrap_or(false);
        rdma = config.data.get("rdma").and_then(|r| r.as_bool()).unwrap_or(false);
    }

    if driver_version.is_none() {
        driver_version = recipe
            .measurements
            .iter()
            .find(|m| m.measurement_type == MeasurementType::Smi)
            .and_then(|m| m.subtype("smi"))
            .and_then(|s| s.data.get("driver-version"))
            .and_then(|r| r.as_str())
            .map(Into::into);
    }

    let mut settings = json!({
        "driver": {
            "useOpenKernelModules": use_open_kernel_module,
        },
        "migStrategy": if mig { "mixed" } else { "single" },
        "gds": { "enabled": rdma },
    });
    if let Some(version) = driver_version {
        settings["driver"]["version"] = Value::String(version);
    }
    if let Some(version) = toolkit_version {
        settings["toolkit"] = json!({ "version": version });
    }

    Some(settings)
}

#[async_trait]
impl Deployer for HelmDeployer {
    async fn generate(
        &self,
        token: &CancellationToken,
        recipe: &RecipeResult,
        bundle_dir: &Path,
    ) -> Result<Artifacts> {
        let mut artifacts = Artifacts::default();
        let ordered = recipe.ordered_components();

        let chart_data = ChartData {
            chart_version: recipe
                .metadata
                .version
                .trim_start_matches('v')
                .to_string(),
            recipe_version: recipe.metadata.version.clone(),
            dependencies: ordered
                .iter()
                .map(|c| ChartDependency {
                    alias: c.name.clone(),
                    chart: c.chart.clone().unwrap_or_else(|| c.name.clone()),
                    version: c.version.clone(),
                    repository: c.source.clone(),
                })
                .collect(),
        };

        let chart = render(CHART_TEMPLATE, &chart_data)?;
        let chart_path = bundle_dir.join("Chart.yaml");
        write_artifact(token, &chart_path, &chart, false)?;
        artifacts.files.push(chart_path);

        if token.is_cancelled() {
            return Err(RecipeError::Cancelled);
        }

        let values = self.compose_values(recipe);
        let values_yaml = format!(
            "# Generated: {}\n# Recipe version: {}\n{}",
            recipe.metadata.generated_at.to_rfc3339(),
            recipe.metadata.version,
            serde_yaml::to_string(&values)
                .map_err(|e| RecipeError::Render(format!("values serialization: {e}")))?,
        );
        let values_path = bundle_dir.join("values.yaml");
        write_artifact(token, &values_path, &values_yaml, false)?;
        artifacts.files.push(values_path);

        if self.config.include_readme {
            let data = ReadmeData {
                timestamp: recipe.metadata.generated_at.to_rfc3339(),
                recipe_version: recipe.metadata.version.clone(),
                components: ordered
                    .iter()
                    .map(|c| ComponentInfo {
                        name: c.name.clone(),
                        version: c.version.clone(),
                        namespace: self.config.namespace_for(&c.name),
                    })
                    .collect(),
            };
            let readme = render(
                README_TEMPLATE,
                &json!({
                    "timestamp": data.timestamp,
                    "recipe_version": data.recipe_version,
                    "components": data.components,
                    "release_namespace": self
                        .config
                        .namespace
                        .clone()
                        .unwrap_or_else(|| "default".to_string()),
                }),
            )?;
            let readme_path = bundle_dir.join("README.md");
            write_artifact(token, &readme_path, &readme, false)?;
            artifacts.files.push(readme_path);
            artifacts.readme_content = Some(readme);
        }

        Ok(artifacts)
    }

    fn validate(&self, recipe: &RecipeResult) -> Result<()> {
        if recipe.component_refs.is_empty() {
            return Err(RecipeError::Render(
                "helm bundle requires at least one component ref".into(),
            ));
        }
        Ok(())
    }

    fn configure(&mut self, config: &DeployerConfig) -> Result<()> {
        self.config = config.clone();
        Ok(())
    }
}
