//! Continuous polling with a live marker view
//!
//! The polling task runs on the runtime; this thread is the UI side. It
//! receives poll events over a channel and reconciles the terminal surface
//! after each one, and at least once per [`REPAINT_EVERY`] so staleness keeps
//! showing while the scheduler sits in a long backoff.
//!
//! When a device is followed along a route, ridership and the drop-off
//! estimate for the current leg's departure stop are refreshed on every leg
//! change and every [`RIDERSHIP_EVERY`].

use super::occupancy::{self, OccupancyReport};
use crate::surface::TerminalSurface;
use anyhow::Result;
use fleetmap_api_client::ApiResult;
use fleetmap_cli::output::{format_count, format_duration};
use fleetmap_cli::{OutputFormat, Status};
use fleetmap_core::config::Config;
use fleetmap_core::DeviceId;
use fleetmap_geo::RouteLeg;
use fleetmap_telemetry::{metrics, Event};
use fleetmap_tracker::{MapPresenter, PollEvent, PollingScheduler, SchedulerConfig};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Longest the view goes without a reconcile
pub const REPAINT_EVERY: Duration = Duration::from_secs(1);

/// Ridership refresh cadence while the leg stays the same
pub const RIDERSHIP_EVERY: Duration = Duration::from_secs(30);

/// Why the UI loop woke up
#[derive(Debug, PartialEq)]
enum Wake {
    Event(PollEvent),
    Repaint,
    Closed,
}

/// Block this thread until the next poll event, or `wait` passes without one
fn wait_for(
    runtime: &Runtime,
    events: &mut mpsc::UnboundedReceiver<PollEvent>,
    wait: Duration,
) -> Wake {
    match runtime.block_on(tokio::time::timeout(wait, events.recv())) {
        Ok(Some(event)) => Wake::Event(event),
        Ok(None) => Wake::Closed,
        Err(_) => Wake::Repaint,
    }
}

/// Decides when the ridership panel needs a new query
#[derive(Debug)]
struct RidershipSchedule {
    every: Duration,
    last: Option<(usize, Instant)>,
}

impl RidershipSchedule {
    fn new(every: Duration) -> Self {
        Self { every, last: None }
    }

    /// Whether to query for 1-based `stop` at `now`; records the query if so
    fn due(&mut self, stop: usize, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some((last_stop, at)) => last_stop != stop || now.duration_since(at) >= self.every,
        };
        if due {
            self.last = Some((stop, now));
        }
        due
    }
}

/// Run until Ctrl-C
pub fn run(runtime: &Runtime, config: &Config, format: OutputFormat) -> Result<()> {
    let schema = &config.schema;
    let client = super::client(config)?;
    let store = super::store(config);
    let reader = store.reader();

    let mut presenter = MapPresenter::new(reader, TerminalSurface::new(format));
    if let Some(route) = schema.route.build(schema.map.arrival_radius_m)? {
        presenter.surface_mut().show_landmarks(route.stops());
        if let Some(device) = &schema.map.follow_device {
            presenter = presenter.with_route(DeviceId::new(device.as_str()), route);
        }
    }

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let scheduler = PollingScheduler::new(
        client.clone(),
        store,
        SchedulerConfig::from_schema(schema),
        events_tx,
    );

    let cancel = CancellationToken::new();
    let polling = runtime.spawn(scheduler.run(cancel.clone()));

    let interrupt = cancel.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            interrupt.cancel();
        }
    });

    if !format.is_json() {
        Status::info(&format!(
            "Watching {} (Ctrl-C to stop)",
            schema.backend.base_url
        ));
    }

    let (ridership_tx, mut ridership) = mpsc::unbounded_channel::<ApiResult<OccupancyReport>>();
    let mut schedule = RidershipSchedule::new(RIDERSHIP_EVERY);

    loop {
        match wait_for(runtime, &mut events, REPAINT_EVERY) {
            Wake::Closed | Wake::Event(PollEvent::Stopped) => break,
            Wake::Event(event) => report_failure(&event, format)?,
            Wake::Repaint => {}
        }
        presenter.reconcile();

        if let Some(leg) = presenter.current_leg() {
            if schedule.due(leg.stop_number(), Instant::now()) {
                spawn_ridership(runtime, &client, &leg, ridership_tx.clone());
            }
        }
        while let Ok(result) = ridership.try_recv() {
            match result {
                Ok(report) => presenter.surface_mut().show_ridership(&report),
                Err(e) => warn!(error = %e, "Ridership unavailable"),
            }
        }
    }

    runtime.block_on(polling)?;

    let summary = metrics().export_json();
    Event::new("watch_stopped", summary).log();
    if !format.is_json() {
        Status::success(&format!(
            "Stopped with {} on the map",
            format_count(presenter.markers().len(), "device", "devices")
        ));
    }
    Ok(())
}

fn report_failure(event: &PollEvent, format: OutputFormat) -> Result<()> {
    let PollEvent::Failure {
        kind,
        message,
        consecutive_failures,
        retry_in,
    } = event
    else {
        return Ok(());
    };
    if format.is_json() {
        println!("{}", serde_json::to_string(event)?);
    } else {
        Status::warning(&format!(
            "{kind} failure #{consecutive_failures}: {message} (retrying in {})",
            format_duration(*retry_in)
        ));
    }
    Ok(())
}

fn spawn_ridership(
    runtime: &Runtime,
    client: &fleetmap_api_client::TelemetryClient,
    leg: &RouteLeg,
    results: mpsc::UnboundedSender<ApiResult<OccupancyReport>>,
) {
    let client = client.clone();
    let stop = leg.stop_number();
    let stop_name = leg.from.clone();
    runtime.spawn(async move {
        let _ = results.send(occupancy::query(&client, stop, Some(stop_name)).await);
    });
}
