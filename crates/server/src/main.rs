//! recipe-server - HTTP front door for recipe resolution
//!
//! Serves resolved recipes for GPU-accelerated Kubernetes clusters from
//! the embedded recipe store, with health probes, Prometheus metrics, and
//! token-bucket back-pressure.

use std::sync::Arc;

use anyhow::Result;
use recipe_lib::builder::RecipeBuilder;
use recipe_lib::store::RecipeStore;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod ratelimit;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!(version = SERVER_VERSION, "Starting recipe-server");

    let config = config::ServerConfig::load()?;

    let store = RecipeStore::embedded()?;
    let builder = RecipeBuilder::new(store);
    let state = Arc::new(api::AppState::new(builder, &config));

    let server_state = state.clone();
    let server_config = config.clone();
    let api_handle = tokio::spawn(async move { api::serve(&server_config, server_state).await });

    tokio::signal::ctrl_c().await?;
    state.set_ready(false);
    info!("Shutting down");
    api_handle.abort();

    Ok(())
}
