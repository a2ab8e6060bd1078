//! Inbound message rate limiter: an
//! atomic counter gating the handler at 100 messages/second, resetting
//! every second.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

const LIMIT_PER_SECOND: u32 = 100;

/// Gates inbound MQTT message dispatch. `admit` returns `false` once the
/// current second's count reaches `LIMIT_PER_SECOND`; the counter resets
/// whenever wall-clock seconds advance, logging how many were dropped in
/// the second that just ended.
pub struct InboundRateLimiter {
    window_start_secs: AtomicU64,
    count: AtomicU32,
    dropped_in_window: AtomicU32,
}

impl InboundRateLimiter {
    pub fn new() -> Self {
        Self {
            window_start_secs: AtomicU64::new(now_secs()),
            count: AtomicU32::new(0),
            dropped_in_window: AtomicU32::new(0),
        }
    }

    pub fn admit(&self) -> bool {
        let now = now_secs();
        let window = self.window_start_secs.load(Ordering::SeqCst);
        if now != window {
            if self
                .window_start_secs
                .compare_exchange(window, now, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let dropped = self.dropped_in_window.swap(0, Ordering::SeqCst);
                if dropped > 0 {
                    warn!(dropped, "mqtt publisher: dropped inbound messages over rate limit");
                }
                self.count.store(0, Ordering::SeqCst);
            }
        }

        let prior = self.count.fetch_add(1, Ordering::SeqCst);
        if prior >= LIMIT_PER_SECOND {
            self.count.fetch_sub(1, Ordering::SeqCst);
            self.dropped_in_window.fetch_add(1, Ordering::SeqCst);
            false
        } else {
            true
        }
    }
}

impl Default for InboundRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
