//! The MQTT Publisher: a Home Assistant discovery publisher
//! with retained availability, dynamic sensor registration, periodic state
//! pushes, and a bounded inbound-message rate limiter.

mod broker_url;
mod config;
mod error;
mod handler;
mod instance_id;
mod publisher;
mod rate_limit;
mod sensors;
mod tokens;
mod topics;

pub use config::PublisherConfig;
pub use error::PublisherError;
pub use handler::{DefaultMessageHandler, MessageHandler};
pub use instance_id::{load_or_create as load_or_create_instance_id, InstanceIdError};
pub use publisher::MqttPublisher;
pub use sensors::{DeviceInfo, DiscoveryPayload, Sensor};
pub use tokens::DailyTokens;
pub use topics::{attributes_topic, availability_topic, base_topic, discovery_topic, state_topic};
