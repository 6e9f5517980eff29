//! Command-line interface parsing for the dashfeed binaries
//!
//! This module handles parsing of CLI arguments using clap for the server and
//! for the Spotify token helper, and how those arguments override the
//! environment configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{Config, SpotifyConfig};
use crate::data::spotify_auth::DEFAULT_CALLBACK_PORT;

/// Error types for CLI startup
#[derive(Debug, Error)]
pub enum CliError {
    /// The token helper needs the app's client credentials
    #[error("Missing SPOTIFY_CLIENT_ID or SPOTIFY_CLIENT_SECRET in the environment or env file")]
    MissingClientCredentials,
}

/// dashfeed - cached JSON endpoints for a personal dashboard
#[derive(Parser, Debug)]
#[command(name = "dashfeed")]
#[command(about = "Serve transit, music, weather, news and time data for a dashboard")]
#[command(version)]
pub struct Cli {
    /// Address to listen on, overrides DASHFEED_BIND
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Env file to read before the process environment (default: ./.env if present)
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, value_name = "FILTER", default_value = "info")]
    pub log: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Applies command-line overrides to the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
    }
}

/// spotify-token - obtain a Spotify refresh token for dashfeed
#[derive(Parser, Debug)]
#[command(name = "spotify-token")]
#[command(about = "Authorize dashfeed with Spotify and print a refresh token")]
#[command(version)]
pub struct TokenCli {
    /// Local port for the OAuth callback; must match the app's redirect URI
    #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
    pub port: u16,

    /// Env file holding SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Print the authorization URL without opening a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// Client id and secret needed by the token helper
///
/// # Returns
/// * `Ok((client_id, client_secret))` if both are configured
/// * `Err(CliError::MissingClientCredentials)` otherwise
pub fn client_credentials(spotify: &SpotifyConfig) -> Result<(String, String), CliError> {
    match (&spotify.client_id, &spotify.client_secret) {
        (Some(id), Some(secret)) => Ok((id.clone(), secret.clone())),
        _ => Err(CliError::MissingClientCredentials),
    }
}
