//! In-memory sliding-window limiter for the anonymous submission endpoint.

use axum::http::HeaderMap;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, VecDeque<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Records a request from `client` and returns whether it is within the limit.
    pub async fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        let history = requests.entry(client.to_string()).or_default();

        while history
            .front()
            .is_some_and(|&seen| now.duration_since(seen) >= self.window)
        {
            history.pop_front();
        }

        if history.len() < self.max_requests {
            history.push_back(now);
            true
        } else {
            false
        }
    }

    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, history| {
            history.retain(|&seen| now.duration_since(seen) < self.window);
            !history.is_empty()
        });
        tracing::debug!("Rate limiter cleanup: {} active clients", requests.len());
    }
}

/// Identity a request is limited under.
///
/// The peer IP unless `trust_forwarded_for` is set, in which case the first
/// `x-forwarded-for` hop wins. Only enable that behind a proxy which overwrites
/// the header; otherwise clients pick their own key.
pub fn client_key(peer: SocketAddr, headers: &HeaderMap, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match forwarded {
        Some(ip) => ip.to_string(),
        None => peer.ip().to_string(),
    }
}
