//! Terminal marker surface
//!
//! Each surface call becomes one line: colored text, or a JSON object per
//! line with `--format json`.

use crate::commands::occupancy::OccupancyReport;
use fleetmap_cli::output::format_lat_lon;
use fleetmap_cli::OutputFormat;
use fleetmap_core::DeviceId;
use fleetmap_geo::{RouteLeg, Stop};
use fleetmap_tracker::{Marker, MarkerSurface};
use owo_colors::OwoColorize;
use serde_json::json;

/// Prints marker changes to stdout
pub struct TerminalSurface {
    format: OutputFormat,
}

impl TerminalSurface {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print the fixed stop landmarks once
    pub fn show_landmarks(&mut self, stops: &[Stop]) {
        if self.format.is_json() {
            println!("{}", json!({ "op": "landmarks", "stops": stops }));
            return;
        }
        for (i, stop) in stops.iter().enumerate() {
            println!(
                "  {} {:<16} {}",
                format!("{:>2}.", i + 1).dimmed(),
                stop.name,
                format_lat_lon(stop.coordinate.latitude, stop.coordinate.longitude).dimmed()
            );
        }
    }

    /// Print a ridership refresh for the current leg
    pub fn show_ridership(&mut self, report: &OccupancyReport) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "op": "ridership", "ridership": report })),
            OutputFormat::Text => println!("{} {}", "👥".bold(), report.summary().dimmed()),
        }
    }

    fn marker_line(marker: &Marker) -> String {
        let coordinate = format_lat_lon(marker.coordinate.latitude, marker.coordinate.longitude);
        if marker.stale {
            format!("{} {} {}", marker.label.bold(), coordinate, "(stale)".yellow())
        } else {
            format!("{} {}", marker.label.bold(), coordinate)
        }
    }
}

impl MarkerSurface for TerminalSurface {
    fn add_marker(&mut self, marker: &Marker) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "op": "add", "marker": marker })),
            OutputFormat::Text => println!("{} {}", "+".green(), Self::marker_line(marker)),
        }
    }

    fn move_marker(&mut self, marker: &Marker) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "op": "move", "marker": marker })),
            OutputFormat::Text => println!("{} {}", "→".cyan(), Self::marker_line(marker)),
        }
    }

    fn remove_marker(&mut self, device_id: &DeviceId) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "op": "remove", "device_id": device_id })),
            OutputFormat::Text => println!("{} {}", "-".red(), device_id),
        }
    }

    fn show_route_leg(&mut self, leg: &RouteLeg) {
        match self.format {
            OutputFormat::Json => println!("{}", json!({ "op": "leg", "leg": leg })),
            OutputFormat::Text => println!("{} {}", "🚌".bold(), leg.to_string().bold()),
        }
    }
}
