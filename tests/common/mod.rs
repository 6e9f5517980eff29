//! Shared helpers for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;

use dashfeed::clock::ManualClock;

/// 2024-07-15 12:00:00 UTC, 14:00 in Amsterdam
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start_time()))
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

/// A fake NTP server answering every request with a fixed transmit timestamp
pub struct FakeNtpServer {
    pub addr: SocketAddr,
    pub requests: Arc<AtomicUsize>,
}

impl FakeNtpServer {
    pub async fn start(seconds: u32, fraction: u32) -> Self {
        Self::start_with_replies(seconds, fraction, usize::MAX).await
    }

    /// Answers the first `replies` requests, then goes silent
    pub async fn start_with_replies(seconds: u32, fraction: u32, replies: usize) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake NTP socket");
        let addr = socket.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 48];
            while let Ok((_, peer)) = socket.recv_from(&mut buf).await {
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                if seen >= replies {
                    continue;
                }
                let mut reply = [0u8; 48];
                reply[0] = 0x1C;
                reply[40..44].copy_from_slice(&seconds.to_be_bytes());
                reply[44..48].copy_from_slice(&fraction.to_be_bytes());
                let _ = socket.send_to(&reply, peer).await;
            }
        });

        Self { addr, requests }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// A local UDP port with nothing listening on it
pub async fn closed_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap().port()
}

/// A bound UDP socket that reads nothing and never answers
///
/// Keep it alive for the duration of the test so the port stays open.
pub async fn silent_udp_socket() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}
