pub mod analysis;
pub mod chart;
pub mod config;
pub mod data;
pub mod export;
pub mod processing;
pub mod server;
pub mod types;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute per-province land-cover statistics from the class raster
    Analyze {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the provincial dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze { config } => {
            println!("Analyzing with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let (provinces, maxima) = analysis::run_analysis(&app_config.analysis)?;
            export::write_outputs(&app_config, &provinces, &maxima)?;

            println!("Analysis complete!");
        }
        Commands::Serve { config } => {
            println!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // Load and validate both documents up front. A failure here
            // means the server never starts: no partial rendering.
            let dataset = data::load_dataset(&app_config)?;

            server::start_server(app_config, dataset).await?;
        }
    }

    Ok(())
}
