//! MOTIS one-to-many HTTP client.
//!
//! Provides driving durations from the MOTIS routing server. Limits the
//! number of requests in flight and maps API failures to [`RoutingError`].

use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::domain::Coordinates;

use super::error::RoutingError;
use super::provider::{Direction, RoutingProvider};

/// Default base URL for the public MOTIS instance.
const DEFAULT_BASE_URL: &str = "https://europe.motis-project.de";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Default snapping radius for positions off the road network (metres).
const DEFAULT_MAX_MATCHING_DISTANCE: u32 = 200;

/// Configuration for the MOTIS client.
#[derive(Debug, Clone)]
pub struct MotisConfig {
    /// Base URL of the MOTIS server
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Routes longer than this are reported unreachable (seconds)
    pub max_travel_secs: i64,
    /// How far a position may be snapped to the road network (metres)
    pub max_matching_distance: u32,
}

impl MotisConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
            max_travel_secs: 3600,
            max_matching_distance: DEFAULT_MAX_MATCHING_DISTANCE,
        }
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_travel(mut self, secs: i64) -> Self {
        self.max_travel_secs = secs;
        self
    }

    pub fn with_max_matching_distance(mut self, metres: u32) -> Self {
        self.max_matching_distance = metres;
        self
    }
}

impl Default for MotisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// One entry of a one-to-many response. MOTIS leaves `duration` out (or
/// sends `null` for the whole entry) when a destination is unreachable.
#[derive(Debug, Deserialize)]
struct OneToManyEntry {
    #[serde(default)]
    duration: Option<f64>,
}

/// MOTIS routing client.
///
/// Uses a semaphore to limit concurrent requests and avoid rate limiting.
#[derive(Debug, Clone)]
pub struct MotisClient {
    http: reqwest::Client,
    config: MotisConfig,
    semaphore: Arc<Semaphore>,
}

impl MotisClient {
    /// Create a new MOTIS client with the given configuration.
    pub fn new(config: MotisConfig) -> Result<Self, RoutingError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
        })
    }

    /// Query parameters of a one-to-many request.
    fn query(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        direction: Direction,
    ) -> Vec<(&'static str, String)> {
        let many = many
            .iter()
            .map(Coordinates::to_string)
            .collect::<Vec<_>>()
            .join(",");
        vec![
            ("one", one.to_string()),
            ("many", many),
            ("max", self.config.max_travel_secs.to_string()),
            (
                "maxMatchingDistance",
                self.config.max_matching_distance.to_string(),
            ),
            ("mode", "CAR".to_string()),
            ("arriveBy", (direction == Direction::Backward).to_string()),
        ]
    }
}

/// Parse a one-to-many response body, checking it answers every destination.
fn parse_durations(body: &str, expected: usize) -> Result<Vec<Option<Duration>>, RoutingError> {
    let entries: Vec<Option<OneToManyEntry>> =
        serde_json::from_str(body).map_err(|e| RoutingError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })?;

    if entries.len() != expected {
        return Err(RoutingError::LengthMismatch {
            expected,
            got: entries.len(),
        });
    }

    Ok(entries
        .into_iter()
        .map(|entry| {
            entry
                .and_then(|e| e.duration)
                .map(|secs| Duration::seconds(secs.round() as i64))
        })
        .collect())
}

impl RoutingProvider for MotisClient {
    async fn one_to_many(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        direction: Direction,
    ) -> Result<Vec<Option<Duration>>, RoutingError> {
        if many.is_empty() {
            return Ok(Vec::new());
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| RoutingError::ApiError {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let url = format!("{}/api/v1/one-to-many", self.config.base_url);
        trace!(%one, destinations = many.len(), ?direction, "one-to-many request");

        let response = self
            .http
            .get(&url)
            .query(&self.query(one, many, direction))
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RoutingError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RoutingError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        parse_durations(&body, many.len())
    }
}
