//! `rcp criteria` - list supported criteria values

use anyhow::Result;
use recipe_lib::criteria::{
    AcceleratorType, FabricType, IntentType, OsType, ServiceType,
};
use serde_json::json;
use tabled::Tabled;

use crate::output::{self, OutputFormat};

#[derive(Tabled)]
struct DimensionRow {
    #[tabled(rename = "DIMENSION")]
    dimension: &'static str,
    #[tabled(rename = "VALUES")]
    values: String,
}

pub fn run(format: OutputFormat) -> Result<()> {
    let dimensions: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("service", ServiceType::supported()),
        ("fabric", FabricType::supported()),
        ("accelerator", AcceleratorType::supported()),
        ("intent", IntentType::supported()),
        ("worker", OsType::supported()),
        ("system", OsType::supported()),
    ];

    match format {
        OutputFormat::Json => {
            let value = json!(dimensions
                .iter()
                .map(|(name, values)| (name.to_string(), values.clone()))
                .collect::<std::collections::BTreeMap<_, _>>());
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Yaml => {
            let value = dimensions
                .iter()
                .map(|(name, values)| (name.to_string(), values.clone()))
                .collect::<std::collections::BTreeMap<_, _>>();
            print!("{}", serde_yaml::to_string(&value)?);
        }
        OutputFormat::Table => {
            let rows: Vec<DimensionRow> = dimensions
                .into_iter()
                .map(|(dimension, values)| DimensionRow {
                    dimension,
                    values: values.join(", "),
                })
                .collect();
            output::print_table(&rows);
            println!("\nEvery dimension also accepts `any` (the default).");
        }
    }
    Ok(())
}
