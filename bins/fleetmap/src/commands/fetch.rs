//! One-shot position fetch

use anyhow::Result;
use fleetmap_cli::output::{format_age, format_count, format_duration, format_lat_lon, print_json};
use fleetmap_cli::{progress, OutputFormat, Status};
use fleetmap_core::config::Config;
use owo_colors::OwoColorize;

/// Fetch once, print every device
pub async fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let client = super::client(config)?;
    let spinner = if format.is_json() {
        progress::hidden()
    } else {
        progress::spinner("Fetching positions...")
    };

    let (positions, elapsed) = match client.positions().fetch_timed().await {
        Ok(result) => result,
        Err(e) => {
            progress::finish_error(&spinner, &format!("{} failure", e.kind()));
            return Err(e.into());
        }
    };
    progress::finish_success(
        &spinner,
        &format!(
            "{} in {}",
            format_count(positions.len(), "fix", "fixes"),
            format_duration(elapsed)
        ),
    );

    let store = super::store(config);
    for position in positions {
        store.upsert(position);
    }
    let states = store.all_current();

    if format.is_json() {
        print_json(&states)?;
        return Ok(());
    }

    if states.is_empty() {
        Status::warning("Backend reported no devices");
        return Ok(());
    }

    Status::header("Devices");
    for state in &states {
        let coordinate = format_lat_lon(
            state.position.coordinate.latitude,
            state.position.coordinate.longitude,
        );
        let age = format_age(state.age);
        println!(
            "  {:<20} {}  ±{:.0}m  {}",
            state.device.name.bold(),
            coordinate,
            state.position.accuracy_m,
            if state.stale {
                format!("{} (stale)", age).yellow().to_string()
            } else {
                age.dimmed().to_string()
            }
        );
    }
    Ok(())
}
