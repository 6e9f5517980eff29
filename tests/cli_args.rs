//! Integration tests for CLI argument handling
//!
//! Runs both binaries with arguments that exit before any network activity.

use std::io::Write;
use std::process::Command;

/// Helper to run a binary with given args and a scrubbed Spotify environment
fn run(bin: &str, args: &[&str]) -> std::process::Output {
    Command::new(bin)
        .args(args)
        .env_remove("SPOTIFY_CLIENT_ID")
        .env_remove("SPOTIFY_CLIENT_SECRET")
        .env_remove("SPOTIFY_REFRESH_TOKEN")
        .env_remove("DASHFEED_BIND")
        .output()
        .expect("Failed to execute binary")
}

fn dashfeed(args: &[&str]) -> std::process::Output {
    run(env!("CARGO_BIN_EXE_dashfeed"), args)
}

fn spotify_token(args: &[&str]) -> std::process::Output {
    run(env!("CARGO_BIN_EXE_spotify-token"), args)
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = dashfeed(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dashfeed"), "Help should mention dashfeed");
    assert!(stdout.contains("--bind"), "Help should mention --bind");
    assert!(stdout.contains("--env-file"), "Help should mention --env-file");
}

#[test]
fn test_invalid_bind_is_rejected() {
    let output = dashfeed(&["--bind", "not-an-address"]);
    assert!(!output.status.success(), "Expected invalid address to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid") || stderr.contains("error"),
        "Should print error message about the address: {}",
        stderr
    );
}

#[test]
fn test_missing_env_file_fails_startup() {
    let output = dashfeed(&["--env-file", "/nonexistent/dashfeed.env"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dashfeed.env"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_bind_in_env_file_fails_startup() {
    let mut env_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(env_file, "DASHFEED_BIND=somewhere").unwrap();

    let output = dashfeed(&["--env-file", env_file.path().to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DASHFEED_BIND"), "stderr: {}", stderr);
}

#[test]
fn test_token_helper_help() {
    let output = spotify_token(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--port"));
    assert!(stdout.contains("--no-browser"));
}

#[test]
fn test_token_helper_requires_client_credentials() {
    let env_file = tempfile::NamedTempFile::new().unwrap();

    let output = spotify_token(&["--no-browser", "--env-file", env_file.path().to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SPOTIFY_CLIENT_ID"), "stderr: {}", stderr);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use dashfeed::cli::{Cli, TokenCli};

    #[test]
    fn test_cli_no_args() {
        let cli = Cli::parse_from(["dashfeed"]);
        assert!(cli.bind.is_none());
        assert_eq!(cli.log, "info");
    }

    #[test]
    fn test_cli_log_filter() {
        let cli = Cli::parse_from(["dashfeed", "--log", "dashfeed=debug,tower_http=warn"]);
        assert_eq!(cli.log, "dashfeed=debug,tower_http=warn");
    }

    #[test]
    fn test_token_cli_port() {
        let cli = TokenCli::parse_from(["spotify-token", "--port", "9999", "--no-browser"]);
        assert_eq!(cli.port, 9999);
        assert!(cli.no_browser);
    }

    #[test]
    fn test_token_cli_rejects_invalid_port() {
        assert!(TokenCli::try_parse_from(["spotify-token", "--port", "70000"]).is_err());
    }
}
