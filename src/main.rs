pub mod config;
pub mod data;
pub mod legend;
pub mod overlay;
pub mod processing;
pub mod render;
pub mod server;
pub mod topo;
pub mod types;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the datasets and render the choropleth and legend SVGs
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Render, then serve the map with the hover-query API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // single log-and-abort path: on any failure nothing is rendered
    if let Err(err) = run().await {
        error!("initialization failed: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let scene = build_scene(&app_config).await?;
            render::write_outputs(&app_config, &scene)?;
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let scene = build_scene(&app_config).await?;
            render::write_outputs(&app_config, &scene)?;
            server::start_server(app_config, scene).await?;
        }
    }

    Ok(())
}

/// Fetch both datasets (wait for both), then run the join & binning
/// pipeline. Rendering only ever starts from a fully built scene.
async fn build_scene(app_config: &config::AppConfig) -> Result<processing::Scene> {
    let (stats, topology) = data::fetch_datasets(&app_config.input).await?;
    processing::Scene::build(&app_config.map, &stats, &topology)
}
