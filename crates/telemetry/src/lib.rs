//! Telemetry, metrics, and observability for fleetmap
//!
//! This crate provides:
//! - Structured logging with tracing (compact or JSON, optional rolling file)
//! - An in-process metrics registry
//! - Timers feeding latency histograms

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};
use uuid::Uuid;

/// Prefix of the daily-rotated log files
pub const LOG_FILE_PREFIX: &str = "fleetmap.log";

/// Samples kept per histogram for percentiles. Count, min, max and mean cover every sample.
pub const HISTOGRAM_WINDOW: usize = 1024;

/// Global metrics registry
static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

/// Global session ID for correlating logs
static SESSION_ID: Lazy<String> = Lazy::new(|| Uuid::new_v4().to_string());

/// Keeps the background log-file writer alive; drop it last.
#[must_use = "dropping the guard stops file logging"]
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the telemetry system
pub fn init() -> anyhow::Result<TelemetryGuard> {
    init_with_config(TelemetryConfig::default())
}

/// Initialize with custom configuration
///
/// `RUST_LOG` wins over `config.log_level`. Console output goes to stderr so
/// command output on stdout stays machine-readable.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", config.log_level, e))?;

    let console = if config.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number)
            .compact()
            .boxed()
    };

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                anyhow::anyhow!("Failed to create log directory {}: {}", dir.display(), e)
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::info!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        log_dir = config.log_dir.as_ref().map(|d| d.display().to_string()),
        "Telemetry initialized"
    );

    Ok(TelemetryGuard { _file: guard })
}

/// Get the current session ID
pub fn session_id() -> &'static str {
    &SESSION_ID
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json: bool,
    pub log_dir: Option<PathBuf>,
    pub show_target: bool,
    pub show_thread_ids: bool,
    pub show_file: bool,
    pub show_line_number: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            log_dir: None,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

/// Metrics registry for collecting and exporting metrics
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, AtomicU64>>,
    gauges: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, Histogram>>,
    start_time: Instant,
}

impl MetricsRegistry {
    fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Increment a counter
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Increment a counter by a specific amount
    pub fn increment_by(&self, name: &str, value: u64) {
        let counters = self.counters.read();
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        } else {
            drop(counters);
            let mut counters = self.counters.write();
            counters
                .entry(name.to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(value, Ordering::Relaxed);
        }
    }

    /// Current counter value; zero if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Set a gauge value
    pub fn gauge(&self, name: &str, value: u64) {
        let mut gauges = self.gauges.write();
        gauges
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Current gauge value, if ever set
    pub fn gauge_value(&self, name: &str) -> Option<u64> {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
    }

    /// Record a histogram value
    pub fn histogram(&self, name: &str, value: f64) {
        let mut histograms = self.histograms.write();
        histograms
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    /// Statistics for one histogram
    pub fn histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        self.histograms
            .read()
            .get(name)
            .map(Histogram::stats)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics as JSON
    pub fn export_json(&self) -> serde_json::Value {
        let counters = self.counters.read();
        let gauges = self.gauges.read();
        let histograms = self.histograms.read();

        let counter_values: HashMap<String, u64> = counters
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let gauge_values: HashMap<String, u64> = gauges
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let histogram_stats: HashMap<String, HistogramStats> = histograms
            .iter()
            .map(|(k, v)| (k.clone(), v.stats()))
            .collect();

        serde_json::json!({
            "session_id": session_id(),
            "uptime_secs": self.uptime_secs(),
            "counters": counter_values,
            "gauges": gauge_values,
            "histograms": histogram_stats,
        })
    }
}

/// Running totals plus a sliding window of recent samples
#[derive(Debug, Default)]
struct Histogram {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
    recent: VecDeque<f64>,
}

impl Histogram {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;

        if self.recent.len() == HISTOGRAM_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(value);
    }

    fn stats(&self) -> HistogramStats {
        if self.count == 0 {
            return HistogramStats::from_values(&[]);
        }
        let recent: Vec<f64> = self.recent.iter().copied().collect();
        HistogramStats {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
            ..HistogramStats::from_values(&recent)
        }
    }
}

/// Histogram statistics. Percentiles cover the last [`HISTOGRAM_WINDOW`] samples.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub window: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl HistogramStats {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                count: 0,
                window: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                p50: 0.0,
                p95: 0.0,
                p99: 0.0,
            };
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Self {
            count,
            window: count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sum / count as f64,
            p50: percentile(&sorted, 50.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Get the global metrics registry
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

/// Timer for measuring operation duration
pub struct Timer {
    name: String,
    start: Instant,
    recorded: bool,
}

impl Timer {
    /// Start a new timer
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(mut self) -> Duration {
        let duration = self.record();
        tracing::debug!(
            metric = %self.name,
            duration_ms = duration.as_millis(),
            "Timer completed"
        );
        duration
    }

    fn record(&mut self) -> Duration {
        let duration = self.start.elapsed();
        metrics().histogram(&self.name, duration.as_secs_f64() * 1000.0);
        self.recorded = true;
        duration
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        // Record duration if not explicitly stopped
        if !self.recorded {
            self.record();
        }
    }
}

/// Event for structured logging
#[derive(Debug, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub event_type: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id().to_string(),
            event_type: event_type.into(),
            data,
        }
    }

    pub fn log(&self) {
        tracing::info!(
            event_type = %self.event_type,
            data = %self.data,
            "Event recorded"
        );
    }
}
