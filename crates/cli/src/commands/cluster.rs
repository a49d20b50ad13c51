//! Clustering command

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::client::{ApiClient, ClusterRequest, ClusterResponse, TyphoonRecord};
use crate::output::{color_silhouette, format_pesos, print_info, print_json, print_warning, OutputFormat};

/// Row for the per-typhoon assignment table
#[derive(Tabled)]
struct AssignmentRow {
    #[tabled(rename = "Typhoon")]
    name: String,
    #[tabled(rename = "Cluster")]
    cluster: usize,
    #[tabled(rename = "Wind (km/h)")]
    wind_speed: String,
    #[tabled(rename = "Rainfall (mm)")]
    rainfall: String,
    #[tabled(rename = "Casualties")]
    casualties: String,
    #[tabled(rename = "Damage")]
    damage: String,
}

/// Row for the cluster centre table
#[derive(Tabled)]
struct CenterRow {
    #[tabled(rename = "Cluster")]
    cluster: usize,
    #[tabled(rename = "Members")]
    members: usize,
    #[tabled(rename = "Wind (km/h)")]
    wind_speed: String,
    #[tabled(rename = "Rainfall (mm)")]
    rainfall: String,
    #[tabled(rename = "Duration (h)")]
    duration: String,
    #[tabled(rename = "Casualties")]
    casualties: String,
    #[tabled(rename = "Damage")]
    damage: String,
    #[tabled(rename = "Province")]
    province: String,
}

/// A records file is either a bare array or a ready-made request body
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsFile {
    Records(Vec<TyphoonRecord>),
    Request { typhoon_data: Vec<TyphoonRecord> },
}

pub fn load_records(path: &Path) -> Result<Vec<TyphoonRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file {}", path.display()))?;
    let parsed: RecordsFile =
        serde_json::from_str(&content).context("Records file is not a list of typhoon records")?;

    Ok(match parsed {
        RecordsFile::Records(records) => records,
        RecordsFile::Request { typhoon_data } => typhoon_data,
    })
}

/// The eight historical typhoons used when no file is given.
/// Kept identical to `typhoon_engine::service::reference_typhoons`.
pub fn reference_records() -> Vec<TyphoonRecord> {
    [
        ("Yolanda", 195.0, 400.0, 48.0, 6300.0, 5.9e9),
        ("Ondoy", 95.0, 455.0, 24.0, 464.0, 1.1e10),
        ("Pablo", 175.0, 200.0, 36.0, 1900.0, 6.8e9),
        ("Lando", 190.0, 300.0, 72.0, 58.0, 1.5e10),
        ("Nina", 150.0, 250.0, 48.0, 12.0, 2.3e9),
        ("Ompong", 170.0, 350.0, 60.0, 81.0, 3.3e10),
        ("Ulysses", 130.0, 200.0, 36.0, 73.0, 1.8e10),
        ("Rolly", 165.0, 180.0, 24.0, 25.0, 2.0e9),
    ]
    .into_iter()
    .map(|(name, wind_speed, rainfall, duration, casualties, damage_cost)| TyphoonRecord {
        name: name.to_string(),
        wind_speed,
        rainfall,
        duration,
        casualties,
        damage_cost,
        province: None,
    })
    .collect()
}

/// Submit a batch for clustering and render the result
pub async fn run_cluster(
    client: &ApiClient,
    file: Option<&Path>,
    k: Option<usize>,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let records = match file {
        Some(path) => load_records(path)?,
        None => reference_records(),
    };

    let request = ClusterRequest {
        typhoon_data: records,
        k,
        seed,
    };
    let response = client.cluster(&request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => render(&request.typhoon_data, &response),
    }

    Ok(())
}

fn render(records: &[TyphoonRecord], response: &ClusterResponse) {
    println!("{}", "Cluster Assignments".bold());

    let rows: Vec<AssignmentRow> = records
        .iter()
        .zip(&response.cluster_assignments)
        .map(|(r, &cluster)| AssignmentRow {
            name: r.name.clone(),
            cluster,
            wind_speed: format!("{:.0}", r.wind_speed),
            rainfall: format!("{:.0}", r.rainfall),
            casualties: format!("{:.0}", r.casualties),
            damage: format_pesos(r.damage_cost),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    println!();

    println!("{}", "Cluster Centers".bold());
    let mut sizes = vec![0usize; response.cluster_centers.len()];
    for &label in &response.cluster_assignments {
        if let Some(slot) = sizes.get_mut(label) {
            *slot += 1;
        }
    }
    let rows: Vec<CenterRow> = response
        .cluster_centers
        .iter()
        .enumerate()
        .map(|(i, c)| CenterRow {
            cluster: i,
            members: sizes[i],
            wind_speed: format!("{:.1}", c.wind_speed),
            rainfall: format!("{:.1}", c.rainfall),
            duration: format!("{:.1}", c.duration),
            casualties: format!("{:.0}", c.casualties),
            damage: format_pesos(c.damage_cost),
            province: c.province.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    println!();

    println!(
        "{} {}",
        "Silhouette score:".bold(),
        color_silhouette(response.silhouette_score)
    );
    print_info(&format!("Iterations: {}", response.iterations));

    if response.partial {
        print_warning("Clustering hit its deadline; this is the best partial result");
    } else if !response.converged {
        print_warning("Clustering did not converge within the iteration limit");
    }
}
