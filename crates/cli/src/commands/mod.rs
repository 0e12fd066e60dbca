//! CLI subcommand implementations

pub mod bundle;
pub mod criteria;
pub mod recipe;

use std::path::PathBuf;

use clap::Args;
use recipe_lib::criteria::{Criteria, CriteriaFile};
use recipe_lib::error::{RecipeError, Result};

/// Criteria flags shared by `recipe` and `bundle`.
#[derive(Debug, Args)]
pub struct CriteriaArgs {
    /// Kubernetes service (eks, gke, aks, oke)
    #[arg(long)]
    pub service: Option<String>,

    /// Network fabric (efa, ib)
    #[arg(long)]
    pub fabric: Option<String>,

    /// GPU family (h100, gb200, a100, l40)
    #[arg(long, alias = "gpu")]
    pub accelerator: Option<String>,

    /// Workload intent (training, inference)
    #[arg(long)]
    pub intent: Option<String>,

    /// Worker node OS (ubuntu, rhel, cos, amazonlinux)
    #[arg(long)]
    pub worker: Option<String>,

    /// System node OS (ubuntu, rhel, cos, amazonlinux)
    #[arg(long)]
    pub system: Option<String>,

    /// Number of worker nodes (0 means unspecified)
    #[arg(long)]
    pub nodes: Option<u32>,

    /// Read criteria from a `kind: recipeCriteria` YAML file instead
    #[arg(long, value_name = "FILE", conflicts_with_all = [
        "service", "fabric", "accelerator", "intent", "worker", "system", "nodes",
    ])]
    pub criteria_file: Option<PathBuf>,
}

impl CriteriaArgs {
    /// Resolve flags (or the criteria file) into typed criteria.
    pub fn resolve(&self) -> Result<Criteria> {
        if let Some(path) = &self.criteria_file {
            let yaml = std::fs::read_to_string(path).map_err(RecipeError::Io)?;
            return CriteriaFile::parse(&yaml);
        }

        let mut criteria = Criteria::new();
        if let Some(s) = &self.service {
            criteria.service = s.parse()?;
        }
        if let Some(s) = &self.fabric {
            criteria.fabric = s.parse()?;
        }
        if let Some(s) = &self.accelerator {
            criteria.accelerator = s.parse()?;
        }
        if let Some(s) = &self.intent {
            criteria.intent = s.parse()?;
        }
        if let Some(s) = &self.worker {
            criteria.worker = s.parse()?;
        }
        if let Some(s) = &self.system {
            criteria.system = s.parse()?;
        }
        if let Some(n) = self.nodes {
            criteria.nodes = n;
        }
        Ok(criteria)
    }
}
