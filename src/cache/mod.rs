//! In-memory cache slots for upstream responses
//!
//! Every endpoint owns one `CacheSlot` holding the last successfully shaped
//! payload. Fresh entries are served without touching the upstream, and
//! expired entries are kept around so a failing upstream can fall back to
//! them.

mod slot;

pub use slot::{CacheSlot, CachedData, Served};
