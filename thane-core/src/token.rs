//! Daily token accumulator.

use chrono::Datelike;
use chrono_tz::Tz;

/// `(input, output, request_count, reset_day, location)` — resets when the
/// current day-of-year in `location` differs from `reset_day`.
#[derive(Debug)]
pub struct TokenAccumulator {
    input: u64,
    output: u64,
    request_count: u64,
    reset_day: u32,
    location: Tz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub input: u64,
    pub output: u64,
    pub request_count: u64,
}

impl TokenAccumulator {
    pub fn new(location: Tz) -> Self {
        Self {
            input: 0,
            output: 0,
            request_count: 0,
            reset_day: Self::day_of_year(location),
            location,
        }
    }

    fn day_of_year(location: Tz) -> u32 {
        chrono::Utc::now().with_timezone(&location).ordinal()
    }

    fn reset_if_new_day(&mut self) {
        let today = Self::day_of_year(self.location);
        if today != self.reset_day {
            self.input = 0;
            self.output = 0;
            self.request_count = 0;
            self.reset_day = today;
        }
    }

    /// Records one request's token usage, resetting first if the day rolled over.
    pub fn record(&mut self, input: u64, output: u64) {
        self.reset_if_new_day();
        self.input += input;
        self.output += output;
        self.request_count += 1;
    }

    /// Snapshot after applying the day-rollover reset.
    pub fn snapshot(&mut self) -> TokenSnapshot {
        self.reset_if_new_day();
        TokenSnapshot {
            input: self.input,
            output: self.output,
            request_count: self.request_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_requests() {
        let mut acc = TokenAccumulator::new(chrono_tz::UTC);
        acc.record(10, 20);
        acc.record(5, 7);
        let snap = acc.snapshot();
        assert_eq!(snap.input, 15);
        assert_eq!(snap.output, 27);
        assert_eq!(snap.request_count, 2);
    }

    #[test]
    fn resets_on_day_rollover() {
        let mut acc = TokenAccumulator::new(chrono_tz::UTC);
        acc.record(100, 200);
        // Force a stale reset_day as if yesterday.
        acc.reset_day = acc.reset_day.wrapping_sub(1).max(1);
        let snap = acc.snapshot();
        assert_eq!(snap.input, 0);
        assert_eq!(snap.output, 0);
        assert_eq!(snap.request_count, 0);
    }
}
