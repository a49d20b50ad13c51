//! Impact prediction command

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, PredictRequest, PredictResponse};
use crate::output::{color_confidence, color_risk, format_pesos, print_json, OutputFormat};

pub async fn run_predict(client: &ApiClient, request: PredictRequest, format: OutputFormat) -> Result<()> {
    let response = client.predict(&request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => render(&request, &response),
    }

    Ok(())
}

fn render(request: &PredictRequest, response: &PredictResponse) {
    println!("{}", "Impact Prediction".bold());
    println!("{}", "=".repeat(50));
    println!("Typhoon:                {}", request.typhoon_name.cyan());
    println!("Province:               {}", request.province);
    println!(
        "Conditions:             {:.0} km/h, {:.0} mm, {:.0} h",
        request.max_wind_speed, request.rainfall_24hr, request.storm_duration
    );
    println!();

    println!("Predicted casualties:   {}", response.predicted_casualties.to_string().bold());
    println!("Predicted damage:       {}", format_pesos(response.predicted_damage_cost).bold());
    println!("Risk level:             {}", color_risk(&response.risk_level));
    println!("Confidence:             {}", color_confidence(response.confidence));

    if !response.recommendations.is_empty() {
        println!();
        println!("{}", "Recommendations".bold());
        println!("{}", "-".repeat(50));
        for action in &response.recommendations {
            println!("  • {}", action);
        }
    }

    if let Some(version) = &response.model_version {
        println!();
        println!("Model: {}", version.dimmed());
    }
}
