//! Daily token accumulator wrapper.

use std::sync::{Arc, Mutex};

use thane_core::{TokenAccumulator, TokenSnapshot};

/// Thread-safe handle around `thane_core::TokenAccumulator`. `OnTokens` is
/// the external token-observer interface callers register. A plain
/// `std::sync::Mutex` is enough here: every critical section is a single
/// non-blocking struct mutation, so there is no reason to hold it across an
/// `.await` point (unlike the Router/Scheduler's `tokio::sync` locks, which
/// guard sections that do hold one).
#[derive(Clone)]
pub struct DailyTokens {
    inner: Arc<Mutex<TokenAccumulator>>,
}

impl DailyTokens {
    pub fn new(location: chrono_tz::Tz) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TokenAccumulator::new(location))),
        }
    }

    /// `OnTokens(in, out)`: thread-safe, also the token-observer
    /// interface used by the API surface.
    pub fn on_tokens(&self, input: u64, output: u64) {
        self.inner.lock().expect("token accumulator mutex poisoned").record(input, output);
    }

    pub fn snapshot(&self) -> TokenSnapshot {
        self.inner.lock().expect("token accumulator mutex poisoned").snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_on_tokens_calls_accumulate_exactly() {
        let tokens = DailyTokens::new(chrono_tz::UTC);
        let mut handles = Vec::new();
        for _ in 0..100 {
            let tokens = tokens.clone();
            handles.push(tokio::spawn(async move {
                tokens.on_tokens(10, 20);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let snap = tokens.snapshot();
        assert_eq!(snap.input, 1000);
        assert_eq!(snap.output, 2000);
        assert_eq!(snap.request_count, 100);
    }
}
