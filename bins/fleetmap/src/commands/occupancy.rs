//! Ridership and drop-off prediction

use anyhow::{bail, Result};
use chrono::Local;
use fleetmap_api_client::{ApiResult, TelemetryClient};
use fleetmap_cli::output::print_json;
use fleetmap_cli::{progress, OutputFormat, Status};
use fleetmap_core::config::Config;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::warn;

/// Riders aboard plus the drop-off estimate for one stop
#[derive(Debug, Clone, Serialize)]
pub struct OccupancyReport {
    pub riders: u32,
    pub available: i32,
    pub stop_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_name: Option<String>,
    pub predicted_offboard: Option<u32>,
}

impl OccupancyReport {
    /// One-line summary for the watch view
    pub fn summary(&self) -> String {
        let estimate = self
            .predicted_offboard
            .map_or_else(|| "no estimate".to_string(), |n| n.to_string());
        format!(
            "{} aboard, {} free, drop-offs at {}: {}",
            self.riders,
            self.available,
            self.stop_label(),
            estimate
        )
    }

    fn stop_label(&self) -> String {
        let stop = self.stop_number;
        self.stop_name
            .as_ref()
            .map_or_else(|| format!("stop {stop}"), |name| format!("{name} (stop {stop})"))
    }
}

/// Fetch ridership and the estimate for 1-based `stop` concurrently.
/// A failed estimate is logged and reported as `None`.
pub async fn query(
    client: &TelemetryClient,
    stop: usize,
    stop_name: Option<String>,
) -> ApiResult<OccupancyReport> {
    let now = Local::now().naive_local();
    let (occupancy, prediction) =
        tokio::join!(client.occupancy_now(), client.predict_offboard(stop, now));
    let occupancy = occupancy?;

    let predicted_offboard = prediction.unwrap_or_else(|e| {
        warn!(error = %e, stop, "Drop-off prediction unavailable");
        None
    });

    Ok(OccupancyReport {
        riders: occupancy.riders,
        available: occupancy.available,
        stop_number: stop,
        stop_name,
        predicted_offboard,
    })
}

/// Query ridership and the drop-off estimate for `stop`
pub async fn run(config: &Config, stop: usize, format: OutputFormat) -> Result<()> {
    if stop == 0 {
        bail!(fleetmap_core::Error::validation("Stop numbers start at 1"));
    }

    let client = super::client(config)?;
    let stop_name = config
        .schema
        .route
        .stops
        .get(stop - 1)
        .map(|s| s.name.clone());

    let spinner = if format.is_json() {
        progress::hidden()
    } else {
        progress::spinner("Querying ridership...")
    };

    let report = match query(&client, stop, stop_name).await {
        Ok(report) => report,
        Err(e) => {
            progress::finish_error(&spinner, "ridership unavailable");
            return Err(e.into());
        }
    };
    spinner.finish_and_clear();

    if format.is_json() {
        print_json(&report)?;
        return Ok(());
    }

    Status::header("Ridership");
    println!("  Riders aboard:   {}", report.riders.bold());
    if report.available < 0 {
        println!("  Free seats:      {}", report.available.red());
    } else {
        println!("  Free seats:      {}", report.available.green());
    }

    let stop_label = report.stop_label();
    match report.predicted_offboard {
        Some(n) => println!("  Drop-offs at {stop_label}: {}", n.bold()),
        None => println!("  Drop-offs at {stop_label}: {}", "no estimate".dimmed()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_names_the_stop() {
        let report = OccupancyReport {
            riders: 12,
            available: 33,
            stop_number: 2,
            stop_name: Some("Dorm 3".to_string()),
            predicted_offboard: Some(5),
        };
        assert_eq!(
            report.summary(),
            "12 aboard, 33 free, drop-offs at Dorm 3 (stop 2): 5"
        );
    }

    #[test]
    fn test_summary_without_estimate() {
        let report = OccupancyReport {
            riders: 0,
            available: 45,
            stop_number: 1,
            stop_name: None,
            predicted_offboard: None,
        };
        assert!(report.summary().ends_with("stop 1: no estimate"));
    }
}
