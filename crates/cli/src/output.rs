//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a format name from the config file, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Pretty-print any response as JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a peso amount with a B/M suffix
pub fn format_pesos(amount: f64) -> String {
    const MILLION: f64 = 1.0e6;
    const BILLION: f64 = 1.0e9;

    if amount >= BILLION {
        format!("₱{:.1}B", amount / BILLION)
    } else if amount >= MILLION {
        format!("₱{:.1}M", amount / MILLION)
    } else {
        format!("₱{:.0}", amount)
    }
}

/// Format confidence as percentage
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Color a risk level
pub fn color_risk(level: &str) -> String {
    match level {
        "High" => level.red().bold().to_string(),
        "Medium" => level.yellow().to_string(),
        "Low" => level.green().to_string(),
        _ => level.to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "active" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color confidence based on value
pub fn color_confidence(confidence: f64) -> String {
    let formatted = format_confidence(confidence);
    if confidence >= 0.8 {
        formatted.green().to_string()
    } else if confidence >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a silhouette score: well separated, overlapping, misassigned
pub fn color_silhouette(score: f64) -> String {
    let formatted = format!("{score:.3}");
    if score >= 0.5 {
        formatted.green().to_string()
    } else if score >= 0.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
