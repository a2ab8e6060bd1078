//! Publisher configuration, assembled by the `thane` binary from the
//! `mqtt` section of `thane_config::Config`.

use std::path::PathBuf;
use std::time::Duration;

/// Floor applied to the configured publish interval.
const MIN_PUBLISH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub broker_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_name: String,
    pub discovery_prefix: String,
    pub publish_interval: Duration,
    pub subscriptions: Vec<String>,
    pub data_dir: PathBuf,
    pub build_version: String,
    pub timezone: chrono_tz::Tz,
}

impl PublisherConfig {
    /// Applies the 5s floor to a caller-supplied interval (e.g. parsed from
    /// YAML, where `thane_config`'s own validation already rejects
    /// `publish_interval < 10s` at load time — this floor is this crate's
    /// own defense against being constructed directly with a smaller one).
    pub fn with_floored_interval(mut self) -> Self {
        if self.publish_interval < MIN_PUBLISH_INTERVAL {
            self.publish_interval = MIN_PUBLISH_INTERVAL;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval_secs: u64) -> PublisherConfig {
        PublisherConfig {
            broker_url: "mqtt://localhost".to_string(),
            username: None,
            password: None,
            device_name: "thane".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            publish_interval: Duration::from_secs(interval_secs),
            subscriptions: vec![],
            data_dir: PathBuf::from("/tmp/thane"),
            build_version: "0.1.0".to_string(),
            timezone: chrono_tz::UTC,
        }
    }

    #[test]
    fn floors_interval_below_five_seconds() {
        let cfg = config(2).with_floored_interval();
        assert_eq!(cfg.publish_interval, MIN_PUBLISH_INTERVAL);
    }

    #[test]
    fn leaves_larger_interval_untouched() {
        let cfg = config(30).with_floored_interval();
        assert_eq!(cfg.publish_interval, Duration::from_secs(30));
    }
}
