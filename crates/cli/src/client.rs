//! API client for fetching recipes from a running recipe-server

use anyhow::{Context, Result};
use recipe_lib::criteria::Criteria;
use recipe_lib::model::RecipeResult;
use reqwest::Client;
use url::Url;

/// Client for the recipe HTTP API.
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid server URL")?;

        Ok(Self { client, base_url })
    }

    /// Fetch a resolved recipe for the criteria.
    pub async fn get_recipe(
        &self,
        criteria: &Criteria,
        include_context: bool,
    ) -> Result<RecipeResult> {
        let mut url = self.base_url.join("/v1/recipe").context("Invalid path")?;

        {
            let mut query = url.query_pairs_mut();
            if !criteria.service.is_any() {
                query.append_pair("service", &criteria.service.to_string());
            }
            if !criteria.fabric.is_any() {
                query.append_pair("fabric", &criteria.fabric.to_string());
            }
            if !criteria.accelerator.is_any() {
                query.append_pair("accelerator", &criteria.accelerator.to_string());
            }
            if !criteria.intent.is_any() {
                query.append_pair("intent", &criteria.intent.to_string());
            }
            if !criteria.worker.is_any() {
                query.append_pair("worker", &criteria.worker.to_string());
            }
            if !criteria.system.is_any() {
                query.append_pair("system", &criteria.system.to_string());
            }
            if criteria.nodes != 0 {
                query.append_pair("nodes", &criteria.nodes.to_string());
            }
            if include_context {
                query.append_pair("context", "true");
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}
