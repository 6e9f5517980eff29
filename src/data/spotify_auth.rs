//! One-time Spotify authorization-code exchange
//!
//! Used by the `spotify-token` binary to turn a browser authorization into
//! the refresh token the music endpoint runs on.

use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::spotify::{TokenResponse, TOKEN_URL};

/// Spotify authorization page
pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Scopes needed to read the current track
pub const SCOPES: &str = "user-read-currently-playing user-read-playback-state";

/// Port the helper listens on by default
pub const DEFAULT_CALLBACK_PORT: u16 = 8888;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while exchanging the authorization code
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Spotify refused the code
    #[error("{0}")]
    Rejected(String),
}

/// Redirect URI registered for the local callback listener
pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{port}/callback")
}

/// Builds the URL the user opens to authorize the app
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> Result<Url, url::ParseError> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("scope", SCOPES),
            ("redirect_uri", redirect_uri),
        ],
    )
}

/// What a request to the callback route carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The user approved; exchange this code
    Code(String),
    /// The user (or Spotify) declined
    Denied(String),
    /// Neither parameter was present
    Empty,
}

impl CallbackOutcome {
    /// Reads the callback's query parameters; an error wins over a code
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        if let Some(error) = params.get("error") {
            return CallbackOutcome::Denied(error.clone());
        }
        match params.get("code") {
            Some(code) if !code.is_empty() => CallbackOutcome::Code(code.clone()),
            _ => CallbackOutcome::Empty,
        }
    }
}

/// Exchanges authorization codes at the accounts token endpoint
#[derive(Debug, Clone)]
pub struct CodeExchange {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl CodeExchange {
    /// Creates an exchange against the public token endpoint
    pub fn new(http: Client, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http,
            token_url: TOKEN_URL.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Overrides the token endpoint URL
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Exchanges `code` for a refresh token
    pub async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<String, ExchangeError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let text = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&text)?;

        match (&token.refresh_token, &token.error) {
            (Some(refresh_token), None) => Ok(refresh_token.clone()),
            _ => Err(ExchangeError::Rejected(token.rejection())),
        }
    }
}
