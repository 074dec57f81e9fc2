use std::sync::Arc;
use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use crate::config::Config;
use crate::controller::AppState;
use crate::repositories::resy_repo::ResyRepo;

pub mod config;
pub mod controller;
pub mod errors;
pub mod helpers;
pub mod http_client;
pub mod models;
pub mod repositories;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    info!("Starting reservation API with {:?}", config);

    let resy_repo = ResyRepo::from_config(&config)
        .context("Failed to build the reservation service client")?;
    let app_state = AppState {
        resy_repo: Arc::new(resy_repo),
    };

    controller::serve(app_state, &config).await
}
