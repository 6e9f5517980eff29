//! spotify-token - one-time Spotify authorization for dashfeed
//!
//! 1. Put SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET in `.env`
//! 2. Register `http://127.0.0.1:8888/callback` as a redirect URI of the app
//! 3. Run `spotify-token`, log in and approve in the browser
//! 4. Copy the printed SPOTIFY_REFRESH_TOKEN into `.env`

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use clap::Parser;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::process::Command;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use dashfeed::cli::{client_credentials, TokenCli};
use dashfeed::config::Config;
use dashfeed::data::spotify_auth::{authorize_url, redirect_uri, CallbackOutcome, CodeExchange};
use dashfeed::logging;

const GOT_IT_PAGE: &str =
    "<h1>Got it!</h1><p>Check your terminal for the refresh token. You can close this tab.</p>";
const DENIED_PAGE: &str = "<h1>Authorization denied</h1><p>You can close this tab.</p>";

#[derive(Clone)]
struct CallbackState {
    outcome_tx: mpsc::Sender<CallbackOutcome>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = TokenCli::parse();
    logging::init_logging("warn", false);

    let config = Config::load(cli.env_file.as_deref())?;
    let (client_id, client_secret) = match client_credentials(&config.spotify) {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let redirect = redirect_uri(cli.port);
    let auth_url = authorize_url(&client_id, &redirect)?;

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, cli.port));
    let listener = TcpListener::bind(addr).await?;
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route("/callback", get(callback_handler))
        .fallback(|| async { StatusCode::NOT_FOUND })
        .with_state(CallbackState { outcome_tx });
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    println!("\nLocal server started on http://{addr}");
    println!("Authorize dashfeed here:\n\n{auth_url}\n");
    if !cli.no_browser {
        if let Err(e) = open_browser(auth_url.as_str()) {
            eprintln!("Could not open a browser ({e}), open the URL above manually.");
        }
    }

    let outcome = outcome_rx
        .recv()
        .await
        .ok_or("callback listener stopped unexpectedly")?;

    let exit_code = match outcome {
        CallbackOutcome::Code(code) => {
            let exchange = CodeExchange::new(reqwest::Client::new(), client_id, client_secret);
            match exchange.exchange(&code, &redirect).await {
                Ok(refresh_token) => {
                    println!("\nSuccess! Add this to your .env file:\n");
                    println!("SPOTIFY_REFRESH_TOKEN={refresh_token}");
                    0
                }
                Err(e) => {
                    eprintln!("\nError: {e}");
                    1
                }
            }
        }
        CallbackOutcome::Denied(error) => {
            eprintln!("\nAuthorization denied: {error}");
            1
        }
        CallbackOutcome::Empty => 1,
    };

    let _ = shutdown_tx.send(());
    let _ = server.await;
    std::process::exit(exit_code);
}

async fn callback_handler(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let outcome = CallbackOutcome::from_query(&params);
    let page = match outcome {
        CallbackOutcome::Code(_) => GOT_IT_PAGE,
        CallbackOutcome::Denied(_) => DENIED_PAGE,
        CallbackOutcome::Empty => return StatusCode::NOT_FOUND.into_response(),
    };

    // Only the first callback matters; later ones find the channel full or closed.
    let _ = state.outcome_tx.try_send(outcome);
    Html(page).into_response()
}

/// Opens `url` in the system browser
fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    };

    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = Command::new("open");
        c.arg(url);
        c
    };

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let mut command = {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };

    command.spawn().map(|_| ())
}
