//! Polling loop
//!
//! ```text
//! Idle ──▶ Polling ──▶ Success ──▶ Idle ──(base interval)──▶ Polling ...
//!                 └──▶ Failure ──▶ Idle ──(backed-off interval)──▶ Polling ...
//! ```
//!
//! A failed poll never ends the loop: it is logged, reported as a
//! [`PollEvent::Failure`] and retried after `min(base * 2^N, max)` where `N`
//! counts consecutive failures. The first success resets `N`.
//!
//! Cancelling the token stops scheduling at once. A fetch already in flight
//! runs to completion (it is bounded by the fetch deadline) and its result is
//! thrown away.

use crate::metric;
use crate::source::PositionSource;
use crate::store::{PositionStore, UpsertOutcome};
use fleetmap_api_client::{ApiError, ApiResult, FailureKind};
use fleetmap_core::backoff::{Backoff, BackoffConfig};
use fleetmap_core::config::ConfigSchema;
use fleetmap_core::Position;
use fleetmap_telemetry::{metrics, Timer};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where the scheduler is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Waiting for the next poll
    Idle,
    /// Fetch in flight
    Polling,
    /// Last poll succeeded
    Success,
    /// Last poll failed
    Failure,
}

/// What happened on one poll, sent to the UI side
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollEvent {
    /// Fetch succeeded and the store has been updated
    Success {
        /// Fixes in the response
        fetched: usize,
        /// Devices seen for the first time
        inserted: usize,
        /// Devices whose fix moved forward
        updated: usize,
        /// Fixes dropped as not newer
        ignored: usize,
        /// Fetch latency
        elapsed: Duration,
    },
    /// Fetch failed; the store is unchanged
    Failure {
        /// Failure class
        kind: FailureKind,
        /// Human-readable cause
        message: String,
        /// Failures in a row, this one included
        consecutive_failures: u32,
        /// Wait before the next attempt
        retry_in: Duration,
    },
    /// The loop has exited
    Stopped,
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Poll cadence and backoff
    pub backoff: BackoffConfig,
    /// Upper bound on one fetch, whatever the source does
    pub fetch_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl SchedulerConfig {
    /// Settings from the application config
    #[must_use]
    pub fn from_schema(schema: &ConfigSchema) -> Self {
        Self {
            backoff: schema.polling.backoff(),
            fetch_timeout: schema.backend.timeout(),
        }
    }
}

/// Polls a [`PositionSource`] and feeds the [`PositionStore`]
pub struct PollingScheduler<S> {
    source: S,
    store: PositionStore,
    config: SchedulerConfig,
    backoff: Backoff,
    state: watch::Sender<SchedulerState>,
    events: mpsc::UnboundedSender<PollEvent>,
}

impl<S: PositionSource> PollingScheduler<S> {
    /// Create a scheduler. It owns the store: it is the only writer.
    pub fn new(
        source: S,
        store: PositionStore,
        config: SchedulerConfig,
        events: mpsc::UnboundedSender<PollEvent>,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            source,
            store,
            backoff: Backoff::new(config.backoff.clone()),
            config,
            state,
            events,
        }
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// The store this scheduler writes
    #[must_use]
    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    /// Failures in a row so far
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.backoff.consecutive_failures()
    }

    /// Poll until `cancel` fires. The first poll starts immediately.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            base_interval_ms = self.config.backoff.base_interval.as_millis(),
            max_interval_ms = self.config.backoff.max_interval.as_millis(),
            fetch_timeout_ms = self.config.fetch_timeout.as_millis(),
            "Polling started"
        );

        while !cancel.is_cancelled() {
            let (result, elapsed) = self.fetch_bounded().await;
            if cancel.is_cancelled() {
                debug!("Discarding fetch result that arrived after cancellation");
                break;
            }
            let delay = self.apply(result, elapsed);
            self.set_state(SchedulerState::Idle);

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(SchedulerState::Idle);
        let _ = self.events.send(PollEvent::Stopped);
        info!("Polling stopped");
    }

    /// One poll: fetch, apply, report. Returns the wait before the next poll.
    pub async fn poll_once(&mut self) -> Duration {
        let (result, elapsed) = self.fetch_bounded().await;
        let delay = self.apply(result, elapsed);
        self.set_state(SchedulerState::Idle);
        delay
    }

    async fn fetch_bounded(&mut self) -> (ApiResult<Vec<Position>>, Duration) {
        self.set_state(SchedulerState::Polling);
        let timer = Timer::start(metric::FETCH_MS);
        let deadline = self.config.fetch_timeout;

        let result = match tokio::time::timeout(deadline, self.source.fetch_positions()).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(deadline)),
        };
        (result, timer.stop())
    }

    fn apply(&mut self, result: ApiResult<Vec<Position>>, elapsed: Duration) -> Duration {
        match result {
            Ok(positions) => self.on_success(positions, elapsed),
            Err(err) => self.on_failure(&err),
        }
    }

    fn on_success(&mut self, positions: Vec<Position>, elapsed: Duration) -> Duration {
        let fetched = positions.len();
        let (mut inserted, mut updated, mut ignored) = (0, 0, 0);
        for position in positions {
            match self.store.upsert(position) {
                UpsertOutcome::Inserted => inserted += 1,
                UpsertOutcome::Updated => updated += 1,
                UpsertOutcome::Ignored => ignored += 1,
            }
        }

        let recovered_after = self.backoff.consecutive_failures();
        let next = self.backoff.record_success();
        if recovered_after > 0 {
            info!(failures = recovered_after, "Polling recovered");
        }

        let registry = metrics();
        registry.increment(metric::POLL_SUCCESS);
        registry.increment_by(metric::POSITIONS_IGNORED, ignored as u64);

        debug!(fetched, inserted, updated, ignored, elapsed_ms = elapsed.as_millis(), "Poll succeeded");
        self.set_state(SchedulerState::Success);
        let _ = self.events.send(PollEvent::Success {
            fetched,
            inserted,
            updated,
            ignored,
            elapsed,
        });
        next
    }

    fn on_failure(&mut self, err: &ApiError) -> Duration {
        let retry_in = self.backoff.record_failure();
        let consecutive_failures = self.backoff.consecutive_failures();
        let kind = err.kind();

        metrics().increment(metric::POLL_FAILURE);
        warn!(
            kind = %kind,
            error = %err,
            consecutive_failures,
            retry_in_ms = retry_in.as_millis(),
            "Poll failed"
        );

        self.set_state(SchedulerState::Failure);
        let _ = self.events.send(PollEvent::Failure {
            kind,
            message: err.to_string(),
            consecutive_failures,
            retry_in,
        });
        retry_in
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }
}
