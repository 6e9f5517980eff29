//! SNTP client for the time endpoint
//!
//! The cached value is the offset between the NTP server and the local
//! clock, so every response is computed from the local clock at serve time.

use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};

use super::TimeReport;
use crate::cache::CacheSlot;
use crate::clock::SharedClock;

/// Standard NTP port
pub const NTP_PORT: u16 = 123;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
pub const NTP_UNIX_EPOCH_DELTA: i64 = 2_208_988_800;

/// How long a measured offset is reused
pub const CACHE_TTL: Duration = Duration::from_secs(60);

/// Upper bound for the whole NTP round trip
const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

const PACKET_LEN: usize = 48;

/// Offset of the transmit timestamp in an NTP packet
const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

/// Errors that can occur during an NTP query
#[derive(Debug, Error)]
pub enum TimeError {
    /// Socket or name resolution failure
    #[error("NTP I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server name resolved to nothing
    #[error("NTP server '{0}' did not resolve")]
    Unresolved(String),

    /// No answer within the timeout
    #[error("NTP timeout")]
    Timeout,

    /// The answer is shorter than an NTP packet
    #[error("NTP response too short: {0} bytes")]
    ShortPacket(usize),
}

/// Builds a client request: LI = 0, version 3, mode 3 (client)
pub fn request_packet() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = 0x1B;
    packet
}

/// Converts a 64-bit NTP timestamp to Unix milliseconds
pub fn ntp_to_unix_millis(seconds: u32, fraction: u32) -> i64 {
    let whole = (i64::from(seconds) - NTP_UNIX_EPOCH_DELTA) * 1000;
    let partial = ((u64::from(fraction) * 1000) >> 32) as i64;
    whole + partial
}

/// Reads the transmit timestamp of a server response as Unix milliseconds
pub fn parse_transmit_timestamp(packet: &[u8]) -> Result<i64, TimeError> {
    let field = packet
        .get(TRANSMIT_TIMESTAMP_OFFSET..TRANSMIT_TIMESTAMP_OFFSET + 8)
        .ok_or(TimeError::ShortPacket(packet.len()))?;
    let seconds = u32::from_be_bytes([field[0], field[1], field[2], field[3]]);
    let fraction = u32::from_be_bytes([field[4], field[5], field[6], field[7]]);
    Ok(ntp_to_unix_millis(seconds, fraction))
}

/// Sends one SNTP request and returns the server time as Unix milliseconds
pub async fn query(server: &str, port: u16, timeout: Duration) -> Result<i64, TimeError> {
    tokio::time::timeout(timeout, exchange(server, port))
        .await
        .map_err(|_| TimeError::Timeout)?
}

async fn exchange(server: &str, port: u16) -> Result<i64, TimeError> {
    let addr = lookup_host((server, port))
        .await?
        .next()
        .ok_or_else(|| TimeError::Unresolved(server.to_string()))?;
    let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;
    socket.send(&request_packet()).await?;

    let mut buf = [0u8; 128];
    let len = socket.recv(&mut buf).await?;
    parse_transmit_timestamp(&buf[..len])
}

/// Network time with a local-clock fallback
#[derive(Debug)]
pub struct TimeService {
    server: String,
    port: u16,
    clock: SharedClock,
    cache: CacheSlot<i64>,
}

impl TimeService {
    /// Creates a new TimeService querying `server` on the NTP port
    pub fn new(server: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            server: server.into(),
            port: NTP_PORT,
            cache: CacheSlot::new("time", CACHE_TTL, clock.clone()),
            clock,
        }
    }

    /// Overrides the UDP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Returns the current time corrected by the last known NTP offset
    ///
    /// Without any successful measurement the local clock is used as is.
    pub async fn now(&self) -> TimeReport {
        let offset = self
            .cache
            .serve(|| async {
                let server_ms = query(&self.server, self.port, REQUEST_TIMEOUT).await?;
                Ok::<_, TimeError>(server_ms - self.clock.now_millis())
            })
            .await
            .or_placeholder(|_| 0);

        TimeReport {
            ts: self.clock.now_millis() + offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_packet() {
        let packet = request_packet();
        assert_eq!(packet.len(), 48);
        assert_eq!(packet[0], 0x1B);
        assert!(packet[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_whole_seconds_conversion() {
        assert_eq!(
            ntp_to_unix_millis(3_913_056_000, 0),
            (3_913_056_000 - 2_208_988_800) * 1000
        );
    }

    #[test]
    fn test_fraction_conversion() {
        // 0x8000_0000 is half a second
        assert_eq!(
            ntp_to_unix_millis(2_208_988_800, 0x8000_0000),
            500
        );
        assert_eq!(ntp_to_unix_millis(2_208_988_800, u32::MAX), 999);
    }

    #[test]
    fn test_parse_transmit_timestamp() {
        let mut packet = [0u8; 48];
        packet[40..44].copy_from_slice(&3_913_056_000u32.to_be_bytes());
        packet[44..48].copy_from_slice(&0x4000_0000u32.to_be_bytes());

        let millis = parse_transmit_timestamp(&packet).unwrap();

        assert_eq!(millis, (3_913_056_000 - 2_208_988_800) * 1000 + 250);
    }

    #[test]
    fn test_short_packet_is_rejected() {
        let result = parse_transmit_timestamp(&[0u8; 20]);
        assert!(matches!(result, Err(TimeError::ShortPacket(20))));
    }
}
