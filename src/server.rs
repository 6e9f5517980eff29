//! HTTP routes for the dashboard endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

use crate::clock::SharedClock;
use crate::config::Config;
use crate::data::{
    NewsService, SpotifyService, TimeService, TransitResponse, TransitService, WeatherService,
};

const USER_AGENT: &str = concat!("dashfeed/", env!("CARGO_PKG_VERSION"));

/// Shared state handed to every route
#[derive(Debug, Clone)]
pub struct AppState {
    pub transit: Arc<TransitService>,
    pub spotify: Arc<SpotifyService>,
    pub weather: Arc<WeatherService>,
    pub news: Arc<NewsService>,
    pub time: Arc<TimeService>,
}

impl AppState {
    /// Builds every service from configuration, sharing one HTTP client
    pub fn from_config(config: &Config, clock: SharedClock) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            transit: Arc::new(TransitService::new(
                config.transit.clone(),
                http.clone(),
                clock.clone(),
            )),
            spotify: Arc::new(SpotifyService::new(
                config.spotify.credentials(),
                http.clone(),
                clock.clone(),
            )),
            weather: Arc::new(WeatherService::new(
                config.weather,
                http.clone(),
                clock.clone(),
            )),
            news: Arc::new(NewsService::new(
                config.news_feed_url.clone(),
                http,
                clock.clone(),
            )),
            time: Arc::new(TimeService::new(config.ntp_server.clone(), clock)),
        })
    }
}

/// Create the dashboard router.
///
/// Provides:
/// - GET /api/bus - Next two departures (500 when nothing can be served)
/// - GET /api/spotify - Currently playing track
/// - GET /api/technews - Latest headlines
/// - GET /api/time - Network time in epoch milliseconds
/// - GET /api/weather - Conditions for two locations
/// - GET /healthz - Liveness probe
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/bus", get(bus_handler))
        .route("/api/spotify", get(spotify_handler))
        .route("/api/technews", get(news_handler))
        .route("/api/time", get(time_handler))
        .route("/api/weather", get(weather_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
}

async fn bus_handler(State(state): State<AppState>) -> Response {
    let response = state.transit.departures().await;
    match response {
        TransitResponse::Board(_) => {
            ([(header::CACHE_CONTROL, "no-cache")], Json(response)).into_response()
        }
        TransitResponse::NoStopData => Json(response).into_response(),
        TransitResponse::Unavailable => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

async fn spotify_handler(State(state): State<AppState>) -> Response {
    let response = state.spotify.now_playing().await;
    let body = Json(response.body());

    if response.is_fresh() {
        (
            [(
                header::CACHE_CONTROL,
                "public, s-maxage=120, stale-while-revalidate=30",
            )],
            body,
        )
            .into_response()
    } else {
        body.into_response()
    }
}

async fn news_handler(State(state): State<AppState>) -> Response {
    Json(state.news.headlines().await).into_response()
}

async fn time_handler(State(state): State<AppState>) -> Response {
    Json(state.time.now().await).into_response()
}

async fn weather_handler(State(state): State<AppState>) -> Response {
    Json(state.weather.report().await).into_response()
}

async fn health_handler() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}
