//! Metacognitive configuration.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("metacognitive config requires 0 < min_sleep ({min_sleep}) <= default_sleep ({default_sleep}) <= max_sleep ({max_sleep})")]
    InvalidBounds {
        min_sleep: i64,
        default_sleep: i64,
        max_sleep: i64,
    },
}

/// Parsed configuration. Durations are parsed from config strings
/// before construction; this type holds the resolved values.
#[derive(Debug, Clone)]
pub struct MetacognitiveConfig {
    pub enabled: bool,
    /// Workspace-relative path to the loop's persistent state file.
    pub state_file: PathBuf,
    pub min_sleep: Duration,
    pub max_sleep: Duration,
    pub default_sleep: Duration,
    /// 0..=1
    pub jitter: f64,
    /// 0..=1
    pub supervisor_probability: f64,
    pub quality_floor: u8,
    pub supervisor_quality_floor: u8,
}

impl MetacognitiveConfig {
    pub fn validate(self) -> Result<Self, ConfigError> {
        if !(self.min_sleep > Duration::zero()
            && self.min_sleep <= self.default_sleep
            && self.default_sleep <= self.max_sleep)
        {
            return Err(ConfigError::InvalidBounds {
                min_sleep: self.min_sleep.num_seconds(),
                default_sleep: self.default_sleep.num_seconds(),
                max_sleep: self.max_sleep.num_seconds(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: i64, default: i64, max: i64) -> MetacognitiveConfig {
        MetacognitiveConfig {
            enabled: true,
            state_file: PathBuf::from("metacognitive.md"),
            min_sleep: Duration::seconds(min),
            max_sleep: Duration::seconds(max),
            default_sleep: Duration::seconds(default),
            jitter: 0.2,
            supervisor_probability: 0.1,
            quality_floor: 5,
            supervisor_quality_floor: 8,
        }
    }

    #[test]
    fn accepts_well_ordered_bounds() {
        assert!(config(120, 600, 1800).validate().is_ok());
    }

    #[test]
    fn rejects_default_below_min() {
        assert!(config(600, 120, 1800).validate().is_err());
    }

    #[test]
    fn rejects_zero_min_sleep() {
        assert!(config(0, 600, 1800).validate().is_err());
    }
}
