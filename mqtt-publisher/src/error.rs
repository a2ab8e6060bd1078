//! `PublisherError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("connect to broker: {0}")]
    Connect(String),
    #[error("publish to {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },
    #[error("subscribe to {filter}: {source}")]
    Subscribe {
        filter: String,
        #[source]
        source: rumqttc::ClientError,
    },
    #[error("instance id: {0}")]
    InstanceId(#[from] crate::instance_id::InstanceIdError),
    #[error("invalid broker url {0:?}")]
    InvalidBrokerUrl(String),
}
