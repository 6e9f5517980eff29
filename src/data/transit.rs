//! OVapi departure board client
//!
//! Fetches the passes of the configured timing point from OVapi and reduces
//! them to the next two departures.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use super::{BusBoard, Departure, ErrorBody};
use crate::cache::CacheSlot;
use crate::clock::SharedClock;
use crate::config::TransitConfig;

/// Base URL for the OVapi timing point API
const OVAPI_BASE_URL: &str = "http://v0.ovapi.nl";

/// How long a departure board is served from cache
pub const CACHE_TTL: Duration = Duration::from_secs(120);

/// Upper bound for each OVapi request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const NO_STOP_DATA: &str = "No data found for start stop";
const FETCH_FAILED: &str = "Failed to fetch bus data";
const NO_UPCOMING_BUS: &str = "No upcoming bus found";

/// Errors that can occur when fetching transit data
#[derive(Debug, Error)]
pub enum TransitError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// What the transit endpoint answers
#[derive(Debug, Clone, PartialEq)]
pub enum TransitResponse {
    /// A departure board, fresh or cached
    Board(BusBoard),
    /// OVapi answered but knows no passes for the start stop
    NoStopData,
    /// The fetch failed and nothing was cached
    Unavailable,
}

impl Serialize for TransitResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TransitResponse::Board(board) => board.serialize(serializer),
            TransitResponse::NoStopData => ErrorBody { error: NO_STOP_DATA }.serialize(serializer),
            TransitResponse::Unavailable => ErrorBody { error: FETCH_FAILED }.serialize(serializer),
        }
    }
}

/// Data for one timing point in the OVapi response
#[derive(Debug, Deserialize)]
struct StopData {
    #[serde(rename = "Stop")]
    stop: Option<StopInfo>,
    #[serde(rename = "Passes")]
    passes: Option<HashMap<String, Pass>>,
}

#[derive(Debug, Deserialize)]
struct StopInfo {
    #[serde(rename = "TimingPointName")]
    timing_point_name: Option<String>,
}

/// A vehicle passing the stop
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Pass {
    line_public_number: String,
    destination_name50: String,
    expected_arrival_time: String,
    #[allow(dead_code)]
    target_arrival_time: String,
    trip_stop_status: String,
}

/// Client for the transit departure board
#[derive(Debug)]
pub struct TransitService {
    http: Client,
    base_url: String,
    config: TransitConfig,
    clock: SharedClock,
    cache: CacheSlot<BusBoard>,
}

impl TransitService {
    /// Creates a new TransitService pointed at the public OVapi
    pub fn new(config: TransitConfig, http: Client, clock: SharedClock) -> Self {
        Self {
            http,
            base_url: OVAPI_BASE_URL.to_string(),
            config,
            cache: CacheSlot::new("transit", CACHE_TTL, clock.clone()),
            clock,
        }
    }

    /// Overrides the OVapi base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the departure board
    ///
    /// # Behavior
    /// - A board younger than the TTL is returned without calling OVapi
    /// - Otherwise both stops are fetched and the new board is cached
    /// - On failure the last board is served regardless of age
    /// - With nothing cached the response is [`TransitResponse::Unavailable`]
    pub async fn departures(&self) -> TransitResponse {
        if let Some(board) = self.cache.fresh().await {
            tracing::debug!("serving cached departure board");
            return TransitResponse::Board(board);
        }

        match self.fetch_board().await {
            Ok(Some(board)) => {
                self.cache.store(board.clone()).await;
                TransitResponse::Board(board)
            }
            Ok(None) => {
                tracing::warn!(stop = %self.config.start_code, "no passes found for start stop");
                TransitResponse::NoStopData
            }
            Err(e) => match self.cache.read().await {
                Some(cached) => {
                    tracing::warn!(error = %e, cached_at = %cached.cached_at, "bus fetch failed, serving stale board");
                    TransitResponse::Board(cached.data)
                }
                None => {
                    tracing::error!(error = %e, "bus fetch failed");
                    TransitResponse::Unavailable
                }
            },
        }
    }

    /// Fetches both stops and builds a board, `None` if the start stop has no passes
    async fn fetch_board(&self) -> Result<Option<BusBoard>, TransitError> {
        let Some(start) = self.fetch_stop(&self.config.start_code).await? else {
            return Ok(None);
        };
        let Some(passes) = start.passes else {
            return Ok(None);
        };

        let start_name = start
            .stop
            .and_then(|s| s.timing_point_name)
            .unwrap_or_else(|| "Start".to_string());

        let end_name = match &self.config.end_code {
            Some(code) => match self.fetch_stop(code).await {
                Ok(stop) => stop
                    .and_then(|s| s.stop)
                    .and_then(|s| s.timing_point_name)
                    .unwrap_or_else(|| "End".to_string()),
                Err(e) => {
                    tracing::warn!(stop = %code, error = %e, "failed to fetch end stop name");
                    "End".to_string()
                }
            },
            None => "End".to_string(),
        };

        Ok(Some(build_board(
            start_name,
            end_name,
            passes.into_values().collect(),
            self.clock.now(),
            &Local,
        )))
    }

    /// Fetches one timing point, `None` if OVapi does not know the code
    async fn fetch_stop(&self, code: &str) -> Result<Option<StopData>, TransitError> {
        let url = format!("{}/tpc/{}", self.base_url, code);

        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        let mut stops: HashMap<String, StopData> = serde_json::from_str(&text)?;

        Ok(stops.remove(code))
    }
}

/// Sorts passes by expected arrival and keeps the first two
///
/// Arrival times without an offset are read in `tz`.
fn build_board<Tz: TimeZone>(
    start_name: String,
    end_name: String,
    passes: Vec<Pass>,
    now: DateTime<Utc>,
    tz: &Tz,
) -> BusBoard {
    let mut timed: Vec<(Option<DateTime<Utc>>, Pass)> = passes
        .into_iter()
        .map(|pass| (parse_arrival(&pass.expected_arrival_time, tz), pass))
        .collect();
    // Unparseable arrival times go last.
    timed.sort_by_key(|(arrival, _)| (arrival.is_none(), *arrival));

    let mut departures = timed
        .into_iter()
        .map(|(arrival, pass)| format_departure(pass, arrival, now));
    let current = departures.next();
    let next = departures.next();

    BusBoard {
        start_name,
        end_name,
        minutes: current.as_ref().map(|d| d.minutes),
        line: current.as_ref().map(|d| d.line.clone()),
        error: current.is_none().then(|| NO_UPCOMING_BUS.to_string()),
        current,
        next,
    }
}

fn format_departure(pass: Pass, arrival: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Departure {
    let minutes = arrival
        .map(|at| (at - now).num_milliseconds().div_euclid(60_000).max(0))
        .unwrap_or(0);

    Departure {
        line: pass.line_public_number,
        destination: pass.destination_name50,
        time: pass.expected_arrival_time,
        minutes,
        status: pass.trip_stop_status,
    }
}

/// Parses an OVapi timestamp such as "2024-07-15T14:32:00"
fn parse_arrival<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}
