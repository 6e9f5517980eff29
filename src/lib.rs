//! dashfeed library
//!
//! Cached upstream clients for a personal dashboard and the HTTP routes that
//! serve them. The binaries in `src/main.rs` and `src/bin/` are thin wrappers
//! around this crate.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod data;
pub mod logging;
pub mod server;
