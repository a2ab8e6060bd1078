//! `NextRun(after)` computation.

use chrono::{DateTime, Utc};
use thane_core::Schedule;

/// Smallest future instant this schedule fires strictly after `after`, or
/// `None` if there is no future run.
///
/// - `at`: "no future run" once `at <= after`.
/// - `every(Δ)`: the smallest `created_at + k*Δ > after`, `k >= 1`.
/// - `cron`: a clean implementation may leave expression evaluation
///   unimplemented as long as this returns "no future run".
pub fn next_run(
    schedule: &Schedule,
    created_at: DateTime<Utc>,
    after: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::At { at } => {
            if *at > after {
                Some(*at)
            } else {
                None
            }
        }
        Schedule::Every { every } => {
            if every.num_milliseconds() <= 0 {
                return None;
            }
            let elapsed = after - created_at;
            let k = if elapsed < chrono::Duration::zero() {
                1
            } else {
                elapsed.num_milliseconds() / every.num_milliseconds() + 1
            };
            Some(created_at + *every * k as i32)
        }
        Schedule::Cron { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn at_schedule_has_no_future_run_once_passed() {
        let at = Utc::now();
        let schedule = Schedule::At { at };
        assert_eq!(next_run(&schedule, at, at), None);
        assert_eq!(next_run(&schedule, at, at + Duration::seconds(1)), None);
    }

    #[test]
    fn at_schedule_returns_future_instant() {
        let now = Utc::now();
        let at = now + Duration::seconds(60);
        let schedule = Schedule::At { at };
        assert_eq!(next_run(&schedule, now, now), Some(at));
    }

    #[test]
    fn every_schedule_finds_next_multiple() {
        let t0 = Utc::now();
        let delta = Duration::seconds(10);
        let schedule = Schedule::Every { every: delta };

        for k in 0..5 {
            let epsilon = Duration::milliseconds(1);
            let after = t0 + delta * k + epsilon;
            let expected = t0 + delta * (k + 1);
            assert_eq!(next_run(&schedule, t0, after), Some(expected));
        }
    }

    #[test]
    fn every_schedule_before_anchor_returns_first_tick() {
        let t0 = Utc::now();
        let delta = Duration::seconds(10);
        let schedule = Schedule::Every { every: delta };
        let before = t0 - Duration::seconds(5);
        assert_eq!(next_run(&schedule, t0, before), Some(t0 + delta));
    }

    #[test]
    fn cron_has_no_future_run() {
        let schedule = Schedule::Cron {
            expr: "*/5 * * * *".to_string(),
        };
        assert_eq!(next_run(&schedule, Utc::now(), Utc::now()), None);
    }
}
