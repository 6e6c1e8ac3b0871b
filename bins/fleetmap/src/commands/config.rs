//! Configuration inspection

use anyhow::Result;
use fleetmap_cli::output::{format_count, format_duration, print_json};
use fleetmap_cli::{OutputFormat, Status};
use fleetmap_core::config::Config;
use serde_json::json;

/// Print the effective configuration with the API key masked
pub fn show(config: &Config, format: OutputFormat) -> Result<()> {
    let redacted = config.redacted();

    if format.is_json() {
        print_json(&json!({
            "path": config.path,
            "overlay": config.overlay,
            "config": redacted,
        }))?;
        return Ok(());
    }

    match &config.path {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# built-in defaults"),
    }
    if let Some(overlay) = &config.overlay {
        println!("# merged {}", overlay.display());
    }
    print!("{}", toml::to_string_pretty(&redacted)?);
    Ok(())
}

/// Report that the configuration is valid. Loading already validated it.
pub fn check(config: &Config, format: OutputFormat) -> Result<()> {
    let schema = &config.schema;
    let route = schema.route.build(schema.map.arrival_radius_m)?;

    if format.is_json() {
        print_json(&json!({
            "valid": true,
            "path": config.path,
            "stops": route.as_ref().map_or(0, |r| r.stops().len()),
        }))?;
        return Ok(());
    }

    Status::success("Configuration is valid");
    match &config.path {
        Some(path) => Status::info(&format!("File: {}", path.display())),
        None => Status::info("No config file found, using defaults"),
    }
    Status::info(&format!("Backend: {}", schema.backend.base_url));
    Status::info(&format!(
        "Polling every {} (backing off to {})",
        format_duration(schema.polling.backoff().base_interval),
        format_duration(schema.polling.backoff().max_interval)
    ));
    match route {
        Some(route) => Status::info(&format!(
            "Route: {}",
            format_count(route.stops().len(), "stop", "stops")
        )),
        None => Status::info("Route: none"),
    }
    if schema.map.api_key.is_none() {
        Status::warning("No map API key (set map.api_key in fleetmap.local.toml or FLEETMAP_MAPS_API_KEY)");
    }
    Ok(())
}
