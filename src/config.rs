//! Runtime configuration loaded from environment variables
//!
//! Variables are read from the process environment, optionally seeded from an
//! env file. Values set in the process environment win over the file.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Default address the server listens on
pub const DEFAULT_BIND: &str = "127.0.0.1:4321";

/// Default OVapi timing point code of the departure stop
pub const DEFAULT_START_CODE: &str = "30005112";

/// Default OVapi timing point code of the destination stop
pub const DEFAULT_END_CODE: &str = "53000011";

/// Default RSS feed for the news endpoint
pub const DEFAULT_NEWS_FEED_URL: &str = "http://feeds.feedburner.com/tweakers/nieuws";

/// Default NTP server for the time endpoint
pub const DEFAULT_NTP_SERVER: &str = "ntp1.hetzner.de";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The env file exists but could not be read or parsed
    #[error("Failed to read env file {path}: {source}")]
    EnvFile {
        path: String,
        #[source]
        source: dotenv::Error,
    },

    /// A variable is set but its value is not usable
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Transit endpoint settings
#[derive(Debug, Clone, PartialEq)]
pub struct TransitConfig {
    /// Timing point code whose departures are shown
    pub start_code: String,
    /// Timing point code used only for the destination name
    pub end_code: Option<String>,
}

/// Spotify credentials as read from the environment, possibly incomplete
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

/// A complete set of Spotify credentials
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl SpotifyConfig {
    /// Returns the credentials only if all three values are present
    pub fn credentials(&self) -> Option<SpotifyCredentials> {
        Some(SpotifyCredentials {
            client_id: self.client_id.clone()?,
            client_secret: self.client_secret.clone()?,
            refresh_token: self.refresh_token.clone()?,
        })
    }
}

/// Weather endpoint settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherConfig {
    pub city1: Location,
    pub city2: Location,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            // Amsterdam
            city1: Location {
                latitude: 52.3676,
                longitude: 4.9041,
            },
            // Rotterdam
            city2: Location {
                latitude: 51.9225,
                longitude: 4.4792,
            },
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: SocketAddr,
    pub transit: TransitConfig,
    pub spotify: SpotifyConfig,
    pub weather: WeatherConfig,
    pub news_feed_url: String,
    pub ntp_server: String,
}

impl Config {
    /// Loads configuration from an env file and the process environment
    ///
    /// With `env_file = None`, a `.env` file in the working directory is used
    /// when present. An explicitly named file must exist.
    pub fn load(env_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut vars = match env_file {
            Some(path) => read_env_file(path)?,
            None if Path::new(".env").exists() => read_env_file(Path::new(".env"))?,
            None => HashMap::new(),
        };
        vars.extend(std::env::vars());
        Self::from_vars(&vars)
    }

    /// Builds configuration from a map of variables
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("DASHFEED_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                key: "DASHFEED_BIND",
                value: bind_raw.clone(),
            })?;

        let start_code = get("OVAPI_START_CODE")
            .or_else(|| get("OVAPI_STOP_CODE"))
            .unwrap_or_else(|| DEFAULT_START_CODE.to_string());
        // An explicitly empty end code disables the destination lookup.
        let end_code = match vars.get("OVAPI_END_CODE") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(raw.trim().to_string()),
            None => Some(DEFAULT_END_CODE.to_string()),
        };

        let defaults = WeatherConfig::default();
        let weather = WeatherConfig {
            city1: Location {
                latitude: parse_coordinate(&get, "WEATHER_CITY1_LAT", defaults.city1.latitude)?,
                longitude: parse_coordinate(&get, "WEATHER_CITY1_LON", defaults.city1.longitude)?,
            },
            city2: Location {
                latitude: parse_coordinate(&get, "WEATHER_CITY2_LAT", defaults.city2.latitude)?,
                longitude: parse_coordinate(&get, "WEATHER_CITY2_LON", defaults.city2.longitude)?,
            },
        };

        Ok(Self {
            bind,
            transit: TransitConfig {
                start_code,
                end_code,
            },
            spotify: SpotifyConfig {
                client_id: get("SPOTIFY_CLIENT_ID"),
                client_secret: get("SPOTIFY_CLIENT_SECRET"),
                refresh_token: get("SPOTIFY_REFRESH_TOKEN"),
            },
            weather,
            news_feed_url: get("NEWS_FEED_URL")
                .unwrap_or_else(|| DEFAULT_NEWS_FEED_URL.to_string()),
            ntp_server: get("NTP_SERVER").unwrap_or_else(|| DEFAULT_NTP_SERVER.to_string()),
        })
    }
}

/// Reads `KEY=value` pairs from an env file without touching the process environment
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let to_error = |source| ConfigError::EnvFile {
        path: path.display().to_string(),
        source,
    };

    // The only dotenv loader that leaves the process environment untouched.
    #[allow(deprecated)]
    let items = dotenv::from_path_iter(path).map_err(to_error)?;

    let mut vars = HashMap::new();
    for item in items {
        let (key, value) = item.map_err(to_error)?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn parse_coordinate(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or(ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_from_empty_environment() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config.bind, DEFAULT_BIND.parse().unwrap());
        assert_eq!(config.transit.start_code, DEFAULT_START_CODE);
        assert_eq!(config.transit.end_code.as_deref(), Some(DEFAULT_END_CODE));
        assert_eq!(config.weather, WeatherConfig::default());
        assert_eq!(config.news_feed_url, DEFAULT_NEWS_FEED_URL);
        assert_eq!(config.ntp_server, DEFAULT_NTP_SERVER);
        assert!(config.spotify.credentials().is_none());
    }

    #[test]
    fn test_legacy_stop_code_is_used_as_start_code() {
        let config = Config::from_vars(&vars(&[("OVAPI_STOP_CODE", "111")])).unwrap();
        assert_eq!(config.transit.start_code, "111");

        let config = Config::from_vars(&vars(&[
            ("OVAPI_STOP_CODE", "111"),
            ("OVAPI_START_CODE", "222"),
        ]))
        .unwrap();
        assert_eq!(config.transit.start_code, "222");
    }

    #[test]
    fn test_empty_end_code_disables_destination_lookup() {
        let config = Config::from_vars(&vars(&[("OVAPI_END_CODE", "")])).unwrap();
        assert!(config.transit.end_code.is_none());
    }

    #[test]
    fn test_weather_coordinates_override_defaults() {
        let config = Config::from_vars(&vars(&[
            ("WEATHER_CITY1_LAT", "53.2194"),
            ("WEATHER_CITY2_LON", "6.5665"),
        ]))
        .unwrap();

        assert!((config.weather.city1.latitude - 53.2194).abs() < 1e-9);
        assert!((config.weather.city1.longitude - 4.9041).abs() < 1e-9);
        assert!((config.weather.city2.longitude - 6.5665).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_coordinate_is_rejected() {
        let err = Config::from_vars(&vars(&[("WEATHER_CITY1_LAT", "north")])).unwrap_err();
        assert!(err.to_string().contains("WEATHER_CITY1_LAT"));
        assert!(err.to_string().contains("north"));
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let err = Config::from_vars(&vars(&[("DASHFEED_BIND", "localhost")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "DASHFEED_BIND",
                ..
            }
        ));
    }

    #[test]
    fn test_spotify_credentials_require_all_values() {
        let partial = Config::from_vars(&vars(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();
        assert!(partial.spotify.credentials().is_none());

        let complete = Config::from_vars(&vars(&[
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
            ("SPOTIFY_REFRESH_TOKEN", "refresh"),
        ]))
        .unwrap();
        let credentials = complete.spotify.credentials().unwrap();
        assert_eq!(credentials.client_id, "id");
        assert_eq!(credentials.refresh_token, "refresh");
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = Config::from_vars(&vars(&[
            ("SPOTIFY_CLIENT_ID", "   "),
            ("NTP_SERVER", ""),
        ]))
        .unwrap();
        assert!(config.spotify.client_id.is_none());
        assert_eq!(config.ntp_server, DEFAULT_NTP_SERVER);
    }

    #[test]
    fn test_read_env_file() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# dashboard\nSPOTIFY_CLIENT_ID=abc\nOVAPI_START_CODE=\"42\"\n",
        )
        .unwrap();

        let vars = read_env_file(&path).expect("env file should parse");
        assert_eq!(vars.get("SPOTIFY_CLIENT_ID").map(String::as_str), Some("abc"));
        assert_eq!(vars.get("OVAPI_START_CODE").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_read_missing_env_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = read_env_file(&dir.path().join("missing.env"));
        assert!(matches!(result, Err(ConfigError::EnvFile { .. })));
    }
}
