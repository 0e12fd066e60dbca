//! `rcp recipe` - resolve a recipe from criteria

use anyhow::Result;
use recipe_lib::builder::{BuildOptions, RecipeBuilder};
use recipe_lib::store::RecipeStore;
use tokio_util::sync::CancellationToken;

use super::CriteriaArgs;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn run(
    criteria_args: &CriteriaArgs,
    include_context: bool,
    server: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let criteria = criteria_args.resolve()?;

    let result = match server {
        Some(url) => {
            ApiClient::new(url)?
                .get_recipe(&criteria, include_context)
                .await?
        }
        None => {
            let store = RecipeStore::embedded()?;
            let builder = RecipeBuilder::new(store);
            builder.build(
                &CancellationToken::new(),
                &criteria,
                &BuildOptions {
                    include_context,
                    generated_at: None,
                },
            )?
        }
    };

    output::print_recipe(&result, format)
}
