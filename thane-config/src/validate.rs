//! Validation rules: "Validation rejects ports outside 1..65535,
//! unknown log levels, unknown log formats, invalid IANA timezones, and MQTT
//! `publish_interval < 10 s`."

use std::str::FromStr;

use thiserror::Error;

use crate::Config;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];
const MIN_MQTT_PUBLISH_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listen.port {0} is outside the valid range 1..65535")]
    Port(u16),
    #[error("unknown log_level {0:?}; expected one of {LOG_LEVELS:?}")]
    LogLevel(String),
    #[error("unknown log_format {0:?}; expected one of {LOG_FORMATS:?}")]
    LogFormat(String),
    #[error("invalid IANA timezone {0:?}")]
    Timezone(String),
    #[error("mqtt.publish_interval {0}s is below the minimum of {MIN_MQTT_PUBLISH_INTERVAL_SECS}s")]
    MqttPublishInterval(u64),
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.listen.port == 0 {
        return Err(ValidationError::Port(config.listen.port));
    }

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        return Err(ValidationError::LogLevel(config.log_level.clone()));
    }

    if !LOG_FORMATS.contains(&config.log_format.as_str()) {
        return Err(ValidationError::LogFormat(config.log_format.clone()));
    }

    if chrono_tz::Tz::from_str(&config.timezone).is_err() {
        return Err(ValidationError::Timezone(config.timezone.clone()));
    }

    if let Some(mqtt) = &config.mqtt {
        if mqtt.publish_interval < MIN_MQTT_PUBLISH_INTERVAL_SECS {
            return Err(ValidationError::MqttPublishInterval(mqtt.publish_interval));
        }
    }

    Ok(())
}
