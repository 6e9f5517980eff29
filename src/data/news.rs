//! RSS headline client
//!
//! Streams the feed through quick-xml and keeps the first items that carry a
//! title.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Weekday};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use super::{Headline, NewsReport};
use crate::cache::CacheSlot;
use crate::clock::SharedClock;

/// How long headlines are served from cache
pub const CACHE_TTL: Duration = Duration::from_secs(300);

/// Upper bound for the feed request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of headlines kept from the feed
pub const MAX_HEADLINES: usize = 10;

/// Errors that can occur when fetching the feed
#[derive(Debug, Error)]
pub enum NewsError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The feed is not well-formed XML
    #[error("Failed to parse feed: {0}")]
    ParseError(#[from] quick_xml::Error),
}

/// Client for the news feed
#[derive(Debug)]
pub struct NewsService {
    http: Client,
    feed_url: String,
    cache: CacheSlot<NewsReport>,
}

impl NewsService {
    /// Creates a new NewsService reading `feed_url`
    pub fn new(feed_url: impl Into<String>, http: Client, clock: SharedClock) -> Self {
        Self {
            http,
            feed_url: feed_url.into(),
            cache: CacheSlot::new("news", CACHE_TTL, clock),
        }
    }

    /// Returns the headlines from cache or the feed, or the unavailable placeholder
    pub async fn headlines(&self) -> NewsReport {
        self.cache
            .serve(|| self.fetch())
            .await
            .or_placeholder(|_| NewsReport::unavailable())
    }

    async fn fetch(&self) -> Result<NewsReport, NewsError> {
        let response = self
            .http
            .get(&self.feed_url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let xml = response.text().await?;

        Ok(NewsReport {
            headlines: parse_feed(&xml, &Local)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    PubDate,
}

/// Extracts up to [`MAX_HEADLINES`] titled items from an RSS document
///
/// Items without a title are skipped. Publication dates are rendered in `tz`.
pub fn parse_feed<Tz: TimeZone>(xml: &str, tz: &Tz) -> Result<Vec<Headline>, NewsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut headlines = Vec::new();
    let mut in_item = false;
    let mut field = None;
    let mut title = String::new();
    let mut pub_date = String::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            // Qualified names, so `media:title` or `dc:title` never count as the title.
            Event::Start(ref e) => match e.name().as_ref() {
                b"item" => {
                    in_item = true;
                    field = None;
                    title.clear();
                    pub_date.clear();
                }
                b"title" if in_item => field = Some(ItemField::Title),
                b"pubDate" if in_item => field = Some(ItemField::PubDate),
                _ => field = None,
            },
            Event::Text(ref e) => {
                let text = match e.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(err) => {
                        tracing::debug!(error = %err, "keeping raw feed text");
                        String::from_utf8_lossy(e).into_owned()
                    }
                };
                append_field(field, &text, &mut title, &mut pub_date);
            }
            Event::CData(ref e) => {
                let text = String::from_utf8_lossy(e);
                append_field(field, &text, &mut title, &mut pub_date);
            }
            Event::End(ref e) => {
                if e.name().as_ref() == b"item" && in_item {
                    in_item = false;
                    let trimmed = title.trim();
                    if !trimmed.is_empty() {
                        headlines.push(Headline {
                            title: trimmed.to_string(),
                            time: format_pub_date(&pub_date, tz),
                        });
                        if headlines.len() == MAX_HEADLINES {
                            break;
                        }
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(headlines)
}

fn append_field(field: Option<ItemField>, text: &str, title: &mut String, pub_date: &mut String) {
    match field {
        Some(ItemField::Title) => title.push_str(text),
        Some(ItemField::PubDate) => pub_date.push_str(text),
        None => {}
    }
}

/// Renders an RFC 2822 date as "<weekday> HH:MM", empty if it does not parse
fn format_pub_date<Tz: TimeZone>(raw: &str, tz: &Tz) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc2822(raw.trim()) else {
        return String::new();
    };
    let local = parsed.with_timezone(tz);
    format!(
        "{} {:02}:{:02}",
        dutch_weekday(local.weekday()),
        local.hour(),
        local.minute()
    )
}

/// Short Dutch weekday name
fn dutch_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "ma",
        Weekday::Tue => "di",
        Weekday::Wed => "wo",
        Weekday::Thu => "do",
        Weekday::Fri => "vr",
        Weekday::Sat => "za",
        Weekday::Sun => "zo",
    }
}
