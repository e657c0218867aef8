pub mod types;
pub mod config;
pub mod error;
pub mod data;
pub mod filter;
pub mod render;
pub mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use render::{render_dashboard, DashboardPage, MapSource};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the interactive dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Write a self-contained dashboard page for one selection
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Defaults to the first year
        #[arg(short, long)]
        year: Option<u16>,
        /// Defaults to the first state in the table
        #[arg(short, long)]
        state: Option<String>,
        #[arg(short, long, value_name = "FILE", default_value = "dashboard.html")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            info!(config = %config.display(), "Starting dashboard");
            let app_config = config::AppConfig::load_from_file(&config)?;

            // A load failure is fatal: the dashboard cannot render without both sources
            let dataset = data::load_dataset(&app_config)
                .await
                .context("Failed to load dashboard data")?;

            server::start_server(app_config, dataset).await?;
        }
        Commands::Render { config, year, state, output } => {
            let app_config = config::AppConfig::load_from_file(&config)?;
            let dataset = data::load_dataset(&app_config)
                .await
                .context("Failed to load dashboard data")?;

            let table = &dataset.table;
            let selection = filter::resolve_selection(table, year, state.as_deref())?;
            let view = filter::derive_view(table, &selection)?;
            let states = table.state_names();
            let geojson = dataset.boundaries.to_geojson().to_string();

            let page = render_dashboard(&DashboardPage {
                states: &states,
                view: Some(&view),
                map: &app_config.map,
                boundaries: MapSource::Inline(&geojson),
                form_action: None,
            })?;

            tokio::fs::write(&output, page)
                .await
                .with_context(|| format!("Failed to write {:?}", output))?;
            info!(output = %output.display(), year = selection.year, state = %selection.state, "Rendered dashboard");
        }
    }

    Ok(())
}
