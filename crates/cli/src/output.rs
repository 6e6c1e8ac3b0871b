//! Terminal output utilities
//!
//! Provides consistent formatting for CLI output.

use clap::ValueEnum;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::time::Duration;

/// How commands print their results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored
    #[default]
    Text,
    /// One JSON document per result
    Json,
}

impl OutputFormat {
    /// Whether output is machine-readable
    pub fn is_json(self) -> bool {
        self == Self::Json
    }
}

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a header
    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(message.chars().count()));
    }

    /// Print a subheader
    pub fn subheader(message: &str) {
        println!();
        println!("{}", message.bold().dimmed());
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a duration for display
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f32();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

/// Format the age of a fix, e.g. `4s ago`, `2m 5s ago`
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 1 {
        "just now".to_string()
    } else if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m {}s ago", secs / 60, secs % 60)
    } else {
        format!("{}h {}m ago", secs / 3600, (secs % 3600) / 60)
    }
}

/// Format a latitude/longitude pair with hemisphere letters
pub fn format_lat_lon(latitude: f64, longitude: f64) -> String {
    let ns = if latitude < 0.0 { 'S' } else { 'N' };
    let ew = if longitude < 0.0 { 'W' } else { 'E' };
    format!("{:.6}°{} {:.6}°{}", latitude.abs(), ns, longitude.abs(), ew)
}

/// Format a count with singular/plural
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ms() {
        let d = Duration::from_millis(500);
        assert_eq!(format_duration(d), "500ms");
    }

    #[test]
    fn test_format_duration_secs() {
        let d = Duration::from_secs_f32(5.5);
        assert_eq!(format_duration(d), "5.5s");
    }

    #[test]
    fn test_format_duration_mins() {
        let d = Duration::from_secs(125);
        assert_eq!(format_duration(d), "2m 5s");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(Duration::from_millis(300)), "just now");
        assert_eq!(format_age(Duration::from_secs(4)), "4s ago");
        assert_eq!(format_age(Duration::from_secs(125)), "2m 5s ago");
        assert_eq!(format_age(Duration::from_secs(7260)), "2h 1m ago");
    }

    #[test]
    fn test_format_lat_lon() {
        assert_eq!(format_lat_lon(36.772679, 126.933898), "36.772679°N 126.933898°E");
        assert_eq!(format_lat_lon(-33.8688, -70.5), "33.868800°S 70.500000°W");
    }

    #[test]
    fn test_format_count_singular() {
        assert_eq!(format_count(1, "device", "devices"), "1 device");
    }

    #[test]
    fn test_format_count_plural() {
        assert_eq!(format_count(5, "device", "devices"), "5 devices");
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
        assert!(OutputFormat::Json.is_json());
    }
}
