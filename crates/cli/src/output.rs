//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table of rows
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format megabytes as human-readable string
pub fn format_memory_mb(mb: i64) -> String {
    const GB: i64 = 1024;
    const TB: i64 = GB * 1024;

    if mb.abs() >= TB {
        format!("{:.2}Ti", mb as f64 / TB as f64)
    } else if mb.abs() >= GB {
        format!("{:.2}Gi", mb as f64 / GB as f64)
    } else {
        format!("{}Mi", mb)
    }
}

/// Format a heartbeat age in milliseconds
pub fn format_age_ms(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m{}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

/// Share of capacity in use, as a percentage
pub fn utilization(allocated: i64, capacity: i64) -> Option<f64> {
    if capacity <= 0 {
        return None;
    }
    Some(allocated as f64 / capacity as f64 * 100.0)
}

/// Color utilization: green below 70%, yellow below 90%, red above
pub fn color_utilization(allocated: i64, capacity: i64) -> String {
    match utilization(allocated, capacity) {
        None => "-".dimmed().to_string(),
        Some(pct) => {
            let formatted = format!("{:.0}%", pct);
            if pct >= 90.0 {
                formatted.red().to_string()
            } else if pct >= 70.0 {
                formatted.yellow().to_string()
            } else {
                formatted.green().to_string()
            }
        }
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "running" => status.green().to_string(),
        "degraded" | "warning" => status.yellow().to_string(),
        "unhealthy" | "error" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Format a unix timestamp for display
pub fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_memory_mb() {
        assert_eq!(format_memory_mb(512), "512Mi");
        assert_eq!(format_memory_mb(2048), "2.00Gi");
        assert_eq!(format_memory_mb(3 * 1024 * 1024), "3.00Ti");
        assert_eq!(format_memory_mb(0), "0Mi");
    }

    #[test]
    fn test_format_age_ms() {
        assert_eq!(format_age_ms(250), "250ms");
        assert_eq!(format_age_ms(1500), "1.5s");
        assert_eq!(format_age_ms(125_000), "2m5s");
    }

    #[test]
    fn test_utilization_without_capacity() {
        assert_eq!(utilization(4, 0), None);
        assert_eq!(utilization(2, 8), Some(25.0));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }
}
