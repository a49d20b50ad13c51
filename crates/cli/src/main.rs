//! Typhoon Impact Analysis CLI
//!
//! A command-line tool for clustering typhoon records, predicting the
//! impact of a single storm and checking the server's model status.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cluster, predict, status};
use std::path::PathBuf;

/// Typhoon Impact Analysis CLI
#[derive(Parser)]
#[command(name = "typhoon")]
#[command(author, version, about = "CLI for Typhoon Impact Analysis", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via TYPHOON_API_URL env var)
    #[arg(long, env = "TYPHOON_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table, or the config file's default_format]
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cluster typhoon records (defaults to eight historical typhoons)
    Cluster {
        /// JSON file with a list of records or a /api/cluster request body
        #[arg(long)]
        file: Option<PathBuf>,

        /// Number of clusters (server default if omitted)
        #[arg(long, short)]
        k: Option<usize>,

        /// Base random seed (server default if omitted)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Predict casualties, damage and risk for one typhoon
    Predict {
        /// Typhoon name
        #[arg(long)]
        name: String,

        /// Affected province
        #[arg(long)]
        province: String,

        /// Maximum sustained wind speed in km/h
        #[arg(long)]
        wind: f64,

        /// 24-hour rainfall in mm
        #[arg(long)]
        rainfall: f64,

        /// Storm duration in hours
        #[arg(long)]
        duration: f64,

        /// Affected population (model reference population if omitted)
        #[arg(long, allow_negative_numbers = true)]
        population: Option<i64>,
    },

    /// Show server health and model status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url);
    let format = config.resolve_format(cli.format);

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    let outcome = match cli.command {
        Commands::Cluster { file, k, seed } => {
            cluster::run_cluster(&client, file.as_deref(), k, seed, format).await
        }
        Commands::Predict {
            name,
            province,
            wind,
            rainfall,
            duration,
            population,
        } => {
            let request = client::PredictRequest {
                typhoon_name: name,
                province,
                max_wind_speed: wind,
                rainfall_24hr: rainfall,
                storm_duration: duration,
                population,
            };
            predict::run_predict(&client, request, format).await
        }
        Commands::Status => status::run_status(&client, format).await,
    };

    if let Err(e) = outcome {
        output::print_error(&format!("{e:#}"));
        if let Some(details) = e
            .downcast_ref::<client::ApiError>()
            .and_then(|api| api.details.as_ref())
        {
            eprintln!("  details: {details}");
        }
        std::process::exit(1);
    }

    Ok(())
}
