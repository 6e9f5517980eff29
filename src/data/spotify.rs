//! Spotify now-playing client
//!
//! Exchanges the configured refresh token for short-lived access tokens and
//! reads the currently playing track. The access token and the track each
//! have their own cache.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use super::NowPlaying;
use crate::cache::CacheSlot;
use crate::clock::SharedClock;
use crate::config::SpotifyCredentials;

/// Spotify accounts token endpoint
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Base URL for the Spotify Web API
const API_BASE_URL: &str = "https://api.spotify.com";

const NOW_PLAYING_PATH: &str = "/v1/me/player/currently-playing";

/// How long a now-playing answer is served from cache
pub const CACHE_TTL: Duration = Duration::from_secs(120);

/// Tokens are refreshed this long before they expire
pub const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Upper bound for each Spotify request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Errors that can occur when talking to Spotify
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The token endpoint did not hand out an access token
    #[error("Token request rejected: {0}")]
    TokenRejected(String),
}

/// Response of the accounts token endpoint, for both grant types
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Human readable reason for a failed token request
    pub(crate) fn rejection(&self) -> String {
        match (&self.error, &self.error_description) {
            (Some(error), Some(description)) => format!("{error}: {description}"),
            (Some(error), None) => error.clone(),
            _ => "no access token in response".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Caches the bearer token until shortly before it expires
#[derive(Debug)]
pub struct TokenCache {
    clock: SharedClock,
    token: RwLock<Option<AccessToken>>,
}

impl TokenCache {
    /// Creates an empty token cache
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            token: RwLock::new(None),
        }
    }

    /// Returns the token while it has more than the expiry buffer left
    pub async fn valid_token(&self) -> Option<String> {
        let guard = self.token.read().await;
        let token = guard.as_ref()?;
        let buffer = ChronoDuration::seconds(TOKEN_EXPIRY_BUFFER.as_secs() as i64);
        (self.clock.now() < token.expires_at - buffer).then(|| token.value.clone())
    }

    /// Stores a token that expires `expires_in_secs` from now
    pub async fn store(&self, value: String, expires_in_secs: i64) {
        let expires_at = self.clock.now() + ChronoDuration::seconds(expires_in_secs);
        *self.token.write().await = Some(AccessToken { value, expires_at });
    }
}

/// Body of the currently-playing endpoint
#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
    item: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
    album: Option<Album>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

/// What the music endpoint answers
#[derive(Debug, Clone, PartialEq)]
pub enum MusicResponse {
    /// Credentials are incomplete; no request was made
    NotConfigured,
    /// Spotify reports nothing playing
    Idle,
    /// A track fetched during this request
    Playing(NowPlaying),
    /// A track served from cache, fresh or stale
    Cached(NowPlaying),
    /// The fetch failed and nothing was cached
    Unavailable,
}

impl MusicResponse {
    /// The JSON payload for this response
    pub fn body(&self) -> NowPlaying {
        match self {
            MusicResponse::NotConfigured => NowPlaying::with_message("Missing credentials"),
            MusicResponse::Idle => NowPlaying::idle(),
            MusicResponse::Playing(track) | MusicResponse::Cached(track) => track.clone(),
            MusicResponse::Unavailable => NowPlaying::with_message("Error fetching data"),
        }
    }

    /// Whether Spotify was reached successfully for this response
    pub fn is_fresh(&self) -> bool {
        matches!(self, MusicResponse::Playing(_))
    }
}

/// Client for the Spotify now-playing endpoint
#[derive(Debug)]
pub struct SpotifyService {
    http: Client,
    credentials: Option<SpotifyCredentials>,
    token_url: String,
    api_base_url: String,
    tokens: TokenCache,
    cache: CacheSlot<NowPlaying>,
}

impl SpotifyService {
    /// Creates a new SpotifyService; `None` credentials disable all requests
    pub fn new(credentials: Option<SpotifyCredentials>, http: Client, clock: SharedClock) -> Self {
        Self {
            http,
            credentials,
            token_url: TOKEN_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
            tokens: TokenCache::new(clock.clone()),
            cache: CacheSlot::new("spotify", CACHE_TTL, clock),
        }
    }

    /// Overrides the accounts token endpoint URL
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Overrides the Web API base URL
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Returns what is currently playing
    ///
    /// # Behavior
    /// - Incomplete credentials short-circuit without any request
    /// - A track younger than the TTL is returned from cache
    /// - "Nothing playing" answers are passed through and not cached
    /// - On failure the last track is served regardless of age
    pub async fn now_playing(&self) -> MusicResponse {
        let Some(credentials) = &self.credentials else {
            return MusicResponse::NotConfigured;
        };

        if let Some(track) = self.cache.fresh().await {
            tracing::debug!("serving cached track");
            return MusicResponse::Cached(track);
        }

        match self.fetch_now_playing(credentials).await {
            Ok(Some(track)) => {
                self.cache.store(track.clone()).await;
                MusicResponse::Playing(track)
            }
            Ok(None) => MusicResponse::Idle,
            Err(e) => match self.cache.read().await {
                Some(cached) => {
                    tracing::warn!(error = %e, cached_at = %cached.cached_at, "spotify fetch failed, serving stale track");
                    MusicResponse::Cached(cached.data)
                }
                None => {
                    tracing::warn!(error = %e, "spotify fetch failed");
                    MusicResponse::Unavailable
                }
            },
        }
    }

    /// Returns a bearer token, refreshing it when close to expiry
    async fn access_token(&self, credentials: &SpotifyCredentials) -> Result<String, SpotifyError> {
        if let Some(token) = self.tokens.valid_token().await {
            return Ok(token);
        }

        tracing::debug!("refreshing spotify access token");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let text = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&text)?;

        let Some(access_token) = token.access_token.clone() else {
            return Err(SpotifyError::TokenRejected(token.rejection()));
        };
        self.tokens
            .store(
                access_token.clone(),
                token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            )
            .await;

        Ok(access_token)
    }

    /// Fetches the current track, `None` when nothing is playing
    async fn fetch_now_playing(
        &self,
        credentials: &SpotifyCredentials,
    ) -> Result<Option<NowPlaying>, SpotifyError> {
        let access_token = self.access_token(credentials).await?;
        let url = format!("{}{}", self.api_base_url, NOW_PLAYING_PATH);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.as_u16() > 400 {
            tracing::debug!(status = status.as_u16(), "spotify reports nothing playing");
            return Ok(None);
        }

        let text = response.text().await?;
        let body: CurrentlyPlaying = serde_json::from_str(&text)?;

        Ok(body.item.map(|track| shape_track(body.is_playing, track)))
    }
}

fn shape_track(is_playing: bool, track: Track) -> NowPlaying {
    let artist = track
        .artists
        .into_iter()
        .map(|a| a.name)
        .collect::<Vec<_>>()
        .join(", ");
    let (album, album_art) = match track.album {
        Some(album) => (
            Some(album.name),
            album.images.into_iter().next().map(|i| i.url),
        ),
        None => (None, None),
    };

    NowPlaying {
        is_playing,
        title: Some(track.name),
        artist: Some(artist),
        album,
        album_art,
        url: track.external_urls.spotify,
        message: None,
    }
}
