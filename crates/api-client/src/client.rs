//! Main API client implementation

use crate::config::ClientConfig;
use crate::endpoints::{Occupancy, OccupancyApi, PositionsApi, PredictionApi, PredictionQuery};
use crate::error::{ApiError, ApiResult};
use chrono::NaiveDateTime;
use fleetmap_core::Position;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn, Span};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// Error bodies longer than this are cut in log lines and errors
const MAX_ERROR_BODY: usize = 256;

/// HTTP client for the IoT backend.
///
/// One request per call: no retries, no caching. Every call is bounded by
/// the configured timeout. Cheap to clone.
#[derive(Clone)]
pub struct TelemetryClient {
    inner: Client,
    config: Arc<ClientConfig>,
}

impl TelemetryClient {
    /// Create a new client with specific configuration
    pub fn with_config(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ApiError::config(format!("invalid user agent: {e}")))?;
        default_headers.insert(USER_AGENT, agent);

        let inner = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| ApiError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner,
            config: Arc::new(config),
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Endpoint API accessors
    // -------------------------------------------------------------------------

    /// Access device position endpoints
    #[must_use]
    pub fn positions(&self) -> PositionsApi {
        PositionsApi::new(self.clone())
    }

    /// Access ridership endpoints
    #[must_use]
    pub fn occupancy(&self) -> OccupancyApi {
        OccupancyApi::new(self.clone())
    }

    /// Access the drop-off prediction service
    #[must_use]
    pub fn prediction(&self) -> PredictionApi {
        PredictionApi::new(self.clone())
    }

    /// Fetch the latest fix of every device. One round trip.
    pub async fn fetch_positions(&self) -> ApiResult<Vec<Position>> {
        self.positions().fetch().await
    }

    /// Current riders and free seats
    pub async fn occupancy_now(&self) -> ApiResult<Occupancy> {
        self.occupancy().current().await
    }

    /// Predicted drop-offs at 1-based `stop_number` for local time `at`
    pub async fn predict_offboard(&self, stop_number: usize, at: NaiveDateTime) -> ApiResult<Option<u32>> {
        self.prediction()
            .offboard(&PredictionQuery::new(stop_number, at))
            .await
    }

    // -------------------------------------------------------------------------
    // Low-level HTTP
    // -------------------------------------------------------------------------

    /// Join a path onto the backend base URL
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    /// GET an absolute URL and decode the JSON body
    #[instrument(skip(self), fields(request_id))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        self.get_json_with_query(url, Option::<&()>::None).await
    }

    /// GET an absolute URL with query parameters and decode the JSON body
    #[instrument(skip(self, query), fields(request_id))]
    pub async fn get_json_with_query<T, Q>(&self, url: &str, query: Option<&Q>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let body = self.get_bytes(url, query).await?;
        serde_json::from_slice(&body).map_err(|e| {
            debug!(url = %url, error = %e, "Response body is not the expected JSON");
            ApiError::from(e)
        })
    }

    /// GET and return the raw body, bounded by the configured timeout
    pub async fn get_bytes<Q>(&self, url: &str, query: Option<&Q>) -> ApiResult<Vec<u8>>
    where
        Q: Serialize + ?Sized,
    {
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());

        let timeout = self.config.timeout;
        let start = Instant::now();

        let attempt = self.execute(&request_id, url, query);
        let result = match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(timeout)),
        };

        match &result {
            Ok(body) => debug!(
                request_id = %request_id,
                url = %url,
                bytes = body.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "Request succeeded"
            ),
            Err(e) => warn!(
                request_id = %request_id,
                url = %url,
                elapsed_ms = start.elapsed().as_millis(),
                error = %e,
                "Request failed"
            ),
        }

        result
    }

    /// Execute a single request without retry
    async fn execute<Q>(&self, request_id: &str, url: &str, query: Option<&Q>) -> ApiResult<Vec<u8>>
    where
        Q: Serialize + ?Sized,
    {
        let mut request = self.inner.get(url).header(X_REQUEST_ID, request_id);
        if let Some(q) = query {
            request = request.query(q);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, self.config.timeout))?;
        self.handle_response(url, response).await
    }

    /// Check status and read the body
    async fn handle_response(&self, url: &str, response: Response) -> ApiResult<Vec<u8>> {
        let status = response.status();

        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ApiError::from_reqwest(e, self.config.timeout))?;
            Ok(bytes.to_vec())
        } else {
            let mut message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            truncate_on_char_boundary(&mut message, MAX_ERROR_BODY);
            Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            })
        }
    }
}

/// Join `base` and `path` with exactly one slash between them
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push('…');
}
