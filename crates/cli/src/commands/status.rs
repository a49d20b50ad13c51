//! Server and model status command

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_success, print_warning, OutputFormat};

pub async fn run_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let model = client.model_status().await?;

    match format {
        OutputFormat::Json => print_json(&json!({ "health": health, "model": model }))?,
        OutputFormat::Table => {
            println!("{}", "Server Status".bold());
            println!("{}", "=".repeat(50));
            println!("Status:                 {}", color_status(&health.status));
            println!("Models loaded:          {}", health.models_loaded);
            println!();

            println!("{}", "Impact Model".bold());
            println!("{}", "-".repeat(50));
            println!("Version:                {}", model.model_version.cyan());
            println!("Family:                 {}", model.model_family);
            println!("Features / targets:     {} / {}", model.features_count, model.targets_count);
            println!(
                "Trained at:             {}",
                model.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("Provinces:              {}", model.provinces.join(", "));
            println!();

            if model.loaded && health.status == "healthy" {
                print_success("Server is ready for predictions");
            } else {
                print_warning("Server is running in a degraded state");
            }
        }
    }

    Ok(())
}
