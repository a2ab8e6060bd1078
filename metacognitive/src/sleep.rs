//! Sleep computation and the supervisor-election Bernoulli
//! roll.

use chrono::Duration;
use rand::Rng;

/// Clamp `d` into `[min, max]`.
pub fn clamp(d: Duration, min: Duration, max: Duration) -> Duration {
    if d < min {
        min
    } else if d > max {
        max
    } else {
        d
    }
}

/// Applies jitter and clamps: `d = next_sleep` (else
/// `default_sleep`), clamp to `[min_sleep, max_sleep]`, then if `jitter>0`
/// multiply by a uniform factor in `[1-jitter, 1+jitter)` and re-clamp.
///
/// `rand_val` is a caller-supplied uniform sample in `[0, 1)`; production
/// callers pass `rand::thread_rng().gen()`, tests pass a fixed value.
pub fn compute_sleep(d: Duration, min: Duration, max: Duration, jitter: f64, rand_val: f64) -> Duration {
    let clamped = clamp(d, min, max);
    if jitter <= 0.0 {
        return clamped;
    }

    let factor = (1.0 - jitter) + rand_val * 2.0 * jitter;
    let scaled_ms = (clamped.num_milliseconds() as f64 * factor) as i64;
    clamp(Duration::milliseconds(scaled_ms), min, max)
}

/// Single Bernoulli roll with success probability `p`. `p <= 0.0` always
/// returns false.
pub fn roll_dice(p: f64) -> bool {
    if p <= 0.0 {
        return false;
    }
    if p >= 1.0 {
        return true;
    }
    rand::thread_rng().gen::<f64>() < p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervisor_probability_zero_never_rolls_true() {
        for _ in 0..100 {
            assert!(!roll_dice(0.0));
        }
    }

    #[test]
    fn supervisor_probability_one_always_rolls_true() {
        for _ in 0..100 {
            assert!(roll_dice(1.0));
        }
    }

    #[test]
    fn clamps_tool_value_below_min() {
        let min = Duration::minutes(2);
        let max = Duration::minutes(30);
        let d = Duration::seconds(30);
        assert_eq!(compute_sleep(d, min, max, 0.0, 0.0), min);
    }

    #[test]
    fn clamps_tool_value_above_max() {
        let min = Duration::minutes(2);
        let max = Duration::minutes(30);
        let d = Duration::hours(1);
        assert_eq!(compute_sleep(d, min, max, 0.0, 0.0), max);
    }

    #[test]
    fn jitter_scales_down_at_lower_bound_of_rand() {
        let d = Duration::minutes(10);
        let min = Duration::seconds(1);
        let max = Duration::hours(1);
        assert_eq!(
            compute_sleep(d, min, max, 0.2, 0.0),
            Duration::minutes(8)
        );
    }

    #[test]
    fn jitter_result_reclamped_to_min() {
        let d = Duration::minutes(8);
        let min = Duration::minutes(5);
        let max = Duration::minutes(30);
        assert_eq!(compute_sleep(d, min, max, 0.5, 0.0), min);
    }
}
