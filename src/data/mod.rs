//! Upstream clients and the JSON payloads they are shaped into
//!
//! Each submodule wraps one third-party service behind its own cache slot.
//! The payload types below are what the HTTP endpoints serialize.

pub mod news;
pub mod spotify;
pub mod spotify_auth;
pub mod time;
pub mod transit;
pub mod weather;

pub use news::{NewsError, NewsService};
pub use spotify::{MusicResponse, SpotifyError, SpotifyService, TokenCache};
pub use time::{TimeError, TimeService};
pub use transit::{TransitError, TransitResponse, TransitService};
pub use weather::{WeatherError, WeatherService};

use serde::{Serialize, Serializer};

/// One departure from the transit stop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    /// Public line number
    pub line: String,
    /// Destination shown on the vehicle
    pub destination: String,
    /// Expected arrival as reported upstream
    pub time: String,
    /// Whole minutes until arrival, computed when the board was fetched
    pub minutes: i64,
    /// Trip status (PLANNED, DRIVING, ARRIVED, ...)
    pub status: String,
}

/// Departure board for the configured stop pair
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusBoard {
    pub start_name: String,
    pub end_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<Departure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Departure>,
    /// Copy of `current.minutes`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
    /// Copy of `current.line`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of an error-only response
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

/// Now-playing state of the music service
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub is_playing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Artist names joined by ", "
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_art: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NowPlaying {
    /// Nothing is playing
    pub fn idle() -> Self {
        Self::default()
    }

    /// Nothing is playing, with an explanation
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Weather warning level, following the Dutch color codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Groen,
    Geel,
    Oranje,
    Rood,
}

/// Current conditions for one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityWeather {
    /// Temperature in Celsius, `"--"` when unknown
    #[serde(serialize_with = "serialize_temperature")]
    pub temp: Option<f64>,
    /// Dutch description of the weather code
    pub condition: String,
    /// Icon key for the dashboard
    pub icon: String,
    pub level: WarningLevel,
    /// Wind speed in km/h
    #[serde(serialize_with = "serialize_reading")]
    pub wind: f64,
}

impl CityWeather {
    /// Placeholder shown when no forecast was ever fetched
    pub fn offline() -> Self {
        Self {
            temp: None,
            condition: "Offline".to_string(),
            icon: "cloud".to_string(),
            level: WarningLevel::Groen,
            wind: 0.0,
        }
    }
}

fn serialize_temperature<S: Serializer>(temp: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match temp {
        Some(value) => serialize_reading(value, serializer),
        None => serializer.serialize_str("--"),
    }
}

/// Whole readings are written as integers (`0`, not `0.0`)
fn serialize_reading<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Weather for both configured locations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city1: CityWeather,
    pub city2: CityWeather,
}

impl WeatherReport {
    /// Placeholder shown when no forecast was ever fetched
    pub fn offline() -> Self {
        Self {
            city1: CityWeather::offline(),
            city2: CityWeather::offline(),
        }
    }
}

/// A single news headline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Headline {
    pub title: String,
    /// Publication time as "<weekday> HH:MM", empty when unknown
    pub time: String,
}

/// Latest headlines from the news feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsReport {
    pub headlines: Vec<Headline>,
}

impl NewsReport {
    /// Placeholder shown when the feed was never fetched
    pub fn unavailable() -> Self {
        Self {
            headlines: vec![Headline {
                title: "News unavailable".to_string(),
                time: "--:--".to_string(),
            }],
        }
    }
}

/// Network time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeReport {
    /// Milliseconds since the Unix epoch
    pub ts: i64,
}
