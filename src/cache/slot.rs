//! A single TTL cache slot with stale fallback

use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::clock::SharedClock;

/// The value held by a slot
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    /// The cached payload
    data: T,
    /// When the payload was fetched
    fetched_at: DateTime<Utc>,
}

/// Result of reading from a slot, including metadata about freshness
#[derive(Debug, Clone)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// Whether the entry is older than the slot's TTL
    pub is_expired: bool,
}

/// How a call to [`CacheSlot::serve`] was answered
#[derive(Debug)]
pub enum Served<T, E> {
    /// Fetched from upstream during this call and stored
    Fresh(T),
    /// Served from a cache entry younger than the TTL
    Cached(T),
    /// Upstream failed; the last cached entry was served regardless of age
    Stale { data: T, error: E },
    /// Upstream failed and nothing was cached
    Failed(E),
}

impl<T, E> Served<T, E> {
    /// Returns the served data, or builds a placeholder from the error
    pub fn or_placeholder(self, placeholder: impl FnOnce(E) -> T) -> T {
        match self {
            Served::Fresh(data) | Served::Cached(data) | Served::Stale { data, .. } => data,
            Served::Failed(error) => placeholder(error),
        }
    }

    /// Short label for logs
    pub fn source(&self) -> &'static str {
        match self {
            Served::Fresh(_) => "fresh",
            Served::Cached(_) => "cached",
            Served::Stale { .. } => "stale",
            Served::Failed(_) => "failed",
        }
    }
}

/// Holds the last good payload of one endpoint
///
/// The slot lives for the whole process. It is populated on the first
/// successful fetch and overwritten on every later one; nothing ever clears
/// it. Reads and writes go through an async `RwLock`, which is never held
/// across the upstream call.
#[derive(Debug)]
pub struct CacheSlot<T> {
    /// Name used in log events
    name: &'static str,
    /// How long an entry counts as fresh
    ttl: Duration,
    clock: SharedClock,
    entry: RwLock<Option<CacheEntry<T>>>,
}

impl<T: Clone> CacheSlot<T> {
    /// Creates an empty slot
    pub fn new(name: &'static str, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            name,
            ttl,
            clock,
            entry: RwLock::new(None),
        }
    }

    /// Reads the current entry, whatever its age
    ///
    /// Returns `None` only if nothing was ever stored.
    pub async fn read(&self) -> Option<CachedData<T>> {
        let guard = self.entry.read().await;
        let entry = guard.as_ref()?;
        Some(CachedData {
            data: entry.data.clone(),
            cached_at: entry.fetched_at,
            is_expired: self.is_expired(entry.fetched_at),
        })
    }

    /// Returns the entry only while it is younger than the TTL
    pub async fn fresh(&self) -> Option<T> {
        self.read()
            .await
            .filter(|cached| !cached.is_expired)
            .map(|cached| cached.data)
    }

    /// Replaces the entry, stamping it with the current time
    pub async fn store(&self, data: T) {
        let fetched_at = self.clock.now();
        *self.entry.write().await = Some(CacheEntry { data, fetched_at });
    }

    /// Serves from cache or upstream
    ///
    /// A fresh entry is returned without calling `fetch`. Otherwise `fetch`
    /// runs; its success is stored and returned, its failure falls back to
    /// the last entry of any age, or to [`Served::Failed`] if there is none.
    pub async fn serve<F, Fut, E>(&self, fetch: F) -> Served<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let served = match self.fresh().await {
            Some(data) => Served::Cached(data),
            None => self.refresh(fetch).await,
        };
        tracing::debug!(slot = self.name, source = served.source(), "served");
        served
    }

    async fn refresh<F, Fut, E>(&self, fetch: F) -> Served<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match fetch().await {
            Ok(data) => {
                self.store(data.clone()).await;
                Served::Fresh(data)
            }
            Err(error) => match self.read().await {
                Some(cached) => {
                    tracing::warn!(
                        slot = self.name,
                        cached_at = %cached.cached_at,
                        error = %error,
                        "upstream failed, serving stale entry"
                    );
                    Served::Stale {
                        data: cached.data,
                        error,
                    }
                }
                None => {
                    tracing::warn!(slot = self.name, error = %error, "upstream failed, nothing cached");
                    Served::Failed(error)
                }
            },
        }
    }

    fn is_expired(&self, fetched_at: DateTime<Utc>) -> bool {
        // A clock that moved backwards yields a negative age, which counts as fresh.
        match (self.clock.now() - fetched_at).to_std() {
            Ok(age) => age >= self.ttl,
            Err(_) => false,
        }
    }
}
