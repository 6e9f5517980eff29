//! Open-Meteo weather API client
//!
//! This module fetches current conditions for the two configured locations
//! from the Open-Meteo API and maps WMO weather codes to Dutch descriptions.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::{CityWeather, WarningLevel, WeatherReport};
use crate::cache::CacheSlot;
use crate::clock::SharedClock;
use crate::config::{Location, WeatherConfig};

/// Base URL for the Open-Meteo API
const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Timezone passed to Open-Meteo
const TIMEZONE: &str = "Europe/Amsterdam";

/// How long a weather report is served from cache
pub const CACHE_TTL: Duration = Duration::from_secs(900);

/// Upper bound for each Open-Meteo request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Presentation of a WMO weather code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmoInfo {
    /// Dutch description
    pub description: &'static str,
    /// Icon key
    pub icon: &'static str,
    pub level: WarningLevel,
}

/// Shown for codes missing from the table
pub const DEFAULT_WMO: WmoInfo = WmoInfo {
    description: "Onbekend",
    icon: "cloud",
    level: WarningLevel::Groen,
};

/// Map a WMO weather code to its description, icon and warning level
///
/// Weather codes from WMO (World Meteorological Organization):
/// - 0-3: Clear to overcast
/// - 45, 48: Fog
/// - 51-57: Drizzle and freezing drizzle
/// - 61-67: Rain and freezing rain
/// - 71-77: Snow
/// - 80-86: Rain and snow showers
/// - 95-99: Thunderstorm
pub fn wmo_info(code: u16) -> WmoInfo {
    use WarningLevel::*;

    let (description, icon, level) = match code {
        0 => ("Helder", "sun", Groen),
        1 => ("Overwegend helder", "sun", Groen),
        2 => ("Half bewolkt", "cloud-sun", Groen),
        3 => ("Bewolkt", "cloud", Groen),
        45 => ("Mist", "mist", Geel),
        48 => ("Rijpmist", "snowflake", Geel),
        51 => ("Lichte motregen", "cloud-drizzle", Groen),
        53 => ("Motregen", "cloud-drizzle", Geel),
        55 => ("Zware motregen", "cloud-rain", Geel),
        56 => ("Ijzel (licht)", "snowflake", Oranje),
        57 => ("Ijzel", "snowflake", Oranje),
        61 => ("Lichte regen", "cloud-rain", Groen),
        63 => ("Regen", "cloud-rain", Geel),
        65 => ("Zware regen", "cloud-storm", Oranje),
        66 => ("IJsregen (licht)", "snowflake", Oranje),
        67 => ("IJsregen", "snowflake", Rood),
        71 => ("Lichte sneeuw", "cloud-snow", Geel),
        73 => ("Sneeuw", "cloud-snow", Geel),
        75 => ("Zware sneeuw", "cloud-snow", Oranje),
        77 => ("Sneeuwkorrels", "cloud-snow", Geel),
        80 => ("Lichte buien", "cloud-rain", Groen),
        81 => ("Buien", "cloud-rain", Geel),
        82 => ("Zware buien", "cloud-storm", Oranje),
        85 => ("Lichte sneeuwbuien", "cloud-snow", Geel),
        86 => ("Zware sneeuwbuien", "cloud-snow", Oranje),
        95 => ("Onweer", "bolt", Oranje),
        96 => ("Onweer + hagel", "bolt", Oranje),
        99 => ("Zwaar onweer", "bolt", Rood),
        _ => return DEFAULT_WMO,
    };

    WmoInfo {
        description,
        icon,
        level,
    }
}

/// Open-Meteo API response structure
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: CurrentWeather,
}

/// Current weather data from Open-Meteo
#[derive(Debug, Deserialize)]
struct CurrentWeather {
    temperature_2m: f64,
    weather_code: u16,
    wind_speed_10m: f64,
}

/// Client for the two-city weather report
#[derive(Debug)]
pub struct WeatherService {
    http: Client,
    base_url: String,
    config: WeatherConfig,
    cache: CacheSlot<WeatherReport>,
}

impl WeatherService {
    /// Create a new WeatherService pointed at the public Open-Meteo API
    pub fn new(config: WeatherConfig, http: Client, clock: SharedClock) -> Self {
        Self {
            http,
            base_url: OPEN_METEO_BASE_URL.to_string(),
            config,
            cache: CacheSlot::new("weather", CACHE_TTL, clock),
        }
    }

    /// Overrides the forecast endpoint URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the report from cache or Open-Meteo, or the offline placeholder
    pub async fn report(&self) -> WeatherReport {
        self.cache
            .serve(|| self.fetch_report())
            .await
            .or_placeholder(|_| WeatherReport::offline())
    }

    /// Fetches both locations concurrently; either failing fails the report
    async fn fetch_report(&self) -> Result<WeatherReport, WeatherError> {
        let (city1, city2) = futures::future::try_join(
            self.fetch_city(self.config.city1),
            self.fetch_city(self.config.city2),
        )
        .await?;

        Ok(WeatherReport { city1, city2 })
    }

    /// Fetch current conditions for the given coordinates
    async fn fetch_city(&self, location: Location) -> Result<CityWeather, WeatherError> {
        let url = format!(
            "{}?latitude={}&longitude={}&current=temperature_2m,weather_code,wind_speed_10m&timezone={}",
            self.base_url, location.latitude, location.longitude, TIMEZONE
        );

        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        let api_response: OpenMeteoResponse = serde_json::from_str(&text)?;

        Ok(parse_response(api_response))
    }
}

/// Shape the Open-Meteo response into the dashboard payload
fn parse_response(response: OpenMeteoResponse) -> CityWeather {
    let current = response.current;
    let wmo = wmo_info(current.weather_code);

    CityWeather {
        temp: Some(current.temperature_2m),
        condition: wmo.description.to_string(),
        icon: wmo.icon.to_string(),
        level: wmo.level,
        wind: current.wind_speed_10m,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample valid Open-Meteo API response
    const VALID_RESPONSE: &str = r#"{
        "latitude": 52.366,
        "longitude": 4.901,
        "generationtime_ms": 0.05,
        "utc_offset_seconds": 7200,
        "timezone": "Europe/Amsterdam",
        "timezone_abbreviation": "CEST",
        "elevation": 13.0,
        "current_units": {
            "time": "iso8601",
            "interval": "seconds",
            "temperature_2m": "°C",
            "weather_code": "wmo code",
            "wind_speed_10m": "km/h"
        },
        "current": {
            "time": "2024-07-15T14:00",
            "interval": 900,
            "temperature_2m": 21.3,
            "weather_code": 95,
            "wind_speed_10m": 18.7
        }
    }"#;

    #[test]
    fn test_parse_valid_response() {
        let response: OpenMeteoResponse =
            serde_json::from_str(VALID_RESPONSE).expect("Failed to parse valid response");

        let city = parse_response(response);

        assert_eq!(city.temp, Some(21.3));
        assert_eq!(city.condition, "Onweer");
        assert_eq!(city.icon, "bolt");
        assert_eq!(city.level, WarningLevel::Oranje);
        assert!((city.wind - 18.7).abs() < 0.01);
    }

    #[test]
    fn test_thunderstorm_code() {
        assert_eq!(
            wmo_info(95),
            WmoInfo {
                description: "Onweer",
                icon: "bolt",
                level: WarningLevel::Oranje,
            }
        );
    }

    #[test]
    fn test_unmapped_code_uses_default() {
        assert_eq!(wmo_info(12), DEFAULT_WMO);
        assert_eq!(wmo_info(12).description, "Onbekend");
        assert_eq!(wmo_info(12).icon, "cloud");
        assert_eq!(wmo_info(12).level, WarningLevel::Groen);
        assert_eq!(wmo_info(1000), DEFAULT_WMO);
    }

    #[test]
    fn test_weather_code_mapping() {
        assert_eq!(wmo_info(0).description, "Helder");
        assert_eq!(wmo_info(2).icon, "cloud-sun");
        assert_eq!(wmo_info(45).level, WarningLevel::Geel);
        assert_eq!(wmo_info(65).icon, "cloud-storm");
        assert_eq!(wmo_info(67).level, WarningLevel::Rood);
        assert_eq!(wmo_info(75).level, WarningLevel::Oranje);
        assert_eq!(wmo_info(99).description, "Zwaar onweer");
    }

    #[test]
    fn test_parse_malformed_json() {
        let malformed = "{ invalid json }";
        let result: Result<OpenMeteoResponse, _> = serde_json::from_str(malformed);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_missing_fields() {
        let missing_code = r#"{
            "current": {
                "temperature_2m": 22.5,
                "wind_speed_10m": 12.5
            }
        }"#;

        let result: Result<OpenMeteoResponse, _> = serde_json::from_str(missing_code);
        assert!(result.is_err());
    }
}
