//! Per-sender sliding-window rate limiting and idle-rotation bookkeeping
//!.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use thane_core::{LastInbound, SenderState};
use tokio::sync::Mutex;

const WINDOW: Duration = Duration::from_secs(60);
const STALE_ADMISSIONS_AGE: Duration = Duration::from_secs(2 * 60);
const STALE_INBOUND_AGE: Duration = Duration::from_secs(20 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Per-sender admission tracking plus idle-rotation bookkeeping. `limit=0`
/// means unlimited.
pub struct RateLimiter {
    limit: u32,
    state: Mutex<HashMap<String, SenderState>>,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Admits or drops one message from `sender`, pruning the sliding
    /// 1-minute window first.
    pub async fn admit(&self, sender: &str) -> bool {
        if self.limit == 0 {
            return true;
        }

        let mut state = self.state.lock().await;
        let entry = state.entry(sender.to_string()).or_default();
        let cutoff = Instant::now() - WINDOW;
        while matches!(entry.admissions.front(), Some(t) if *t < cutoff) {
            entry.admissions.pop_front();
        }

        if entry.admissions.len() as u32 >= self.limit {
            return false;
        }
        entry.admissions.push_back(Instant::now());
        true
    }

    /// The sender's previous `last_inbound` record, if any, read *before*
    /// `record_inbound` overwrites it.
    pub async fn last_inbound(&self, sender: &str) -> Option<LastInbound> {
        let state = self.state.lock().await;
        state.get(sender).and_then(|s| s.last_inbound.clone())
    }

    pub async fn record_inbound(&self, sender: &str, signal_timestamp: i64) {
        let mut state = self.state.lock().await;
        let entry = state.entry(sender.to_string()).or_default();
        entry.last_inbound = Some(LastInbound {
            signal_timestamp,
            received_at: Instant::now(),
        });
    }

    /// Evicts stale bookkeeping. Run on a 10-minute cadence by the bridge.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.retain(|_, s| {
            let admissions_stale = match s.admissions.back() {
                Some(t) => now.duration_since(*t) >= STALE_ADMISSIONS_AGE,
                None => true,
            };
            if admissions_stale {
                s.admissions.clear();
            }
            if let Some(li) = &s.last_inbound {
                if now.duration_since(li.received_at) >= STALE_INBOUND_AGE {
                    s.last_inbound = None;
                }
            }
            !s.admissions.is_empty() || s.last_inbound.is_some()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limit_two_allows_two_then_drops() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.admit("s1").await);
        assert!(limiter.admit("s1").await);
        assert!(!limiter.admit("s1").await);
    }

    #[tokio::test]
    async fn new_sender_is_unaffected_by_another_senders_count() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.admit("s1").await);
        assert!(limiter.admit("s1").await);
        assert!(!limiter.admit("s1").await);
        assert!(limiter.admit("s2").await);
    }

    #[tokio::test]
    async fn zero_limit_is_unlimited() {
        let limiter = RateLimiter::new(0);
        for _ in 0..10 {
            assert!(limiter.admit("s1").await);
        }
    }

    #[tokio::test]
    async fn first_ever_message_has_no_last_inbound() {
        let limiter = RateLimiter::new(10);
        assert!(limiter.last_inbound("new-sender").await.is_none());
    }

    #[tokio::test]
    async fn record_inbound_is_readable_afterward() {
        let limiter = RateLimiter::new(10);
        limiter.record_inbound("s1", 42).await;
        let recorded = limiter.last_inbound("s1").await.unwrap();
        assert_eq!(recorded.signal_timestamp, 42);
    }
}
