//! MQTT topic layout.

/// `thane/<device>`, the root every other topic is built under.
pub fn base_topic(device: &str) -> String {
    format!("thane/{device}")
}

pub fn availability_topic(device: &str) -> String {
    format!("{}/availability", base_topic(device))
}

pub fn state_topic(device: &str, entity_suffix: &str) -> String {
    format!("{}/{entity_suffix}/state", base_topic(device))
}

pub fn attributes_topic(device: &str, entity_suffix: &str) -> String {
    format!("{}/{entity_suffix}/attributes", base_topic(device))
}

/// `<discovery_prefix>/sensor/<device>/<entity_suffix>/config`.
pub fn discovery_topic(discovery_prefix: &str, component: &str, device: &str, entity_suffix: &str) -> String {
    format!("{discovery_prefix}/{component}/{device}/{entity_suffix}/config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_topic_shape() {
        assert_eq!(base_topic("thane-living-room"), "thane/thane-living-room");
    }

    #[test]
    fn discovery_topic_shape() {
        assert_eq!(
            discovery_topic("homeassistant", "sensor", "thane-living-room", "uptime"),
            "homeassistant/sensor/thane-living-room/uptime/config"
        );
    }

    #[test]
    fn state_topic_shape() {
        assert_eq!(
            state_topic("thane-living-room", "uptime"),
            "thane/thane-living-room/uptime/state"
        );
    }

    #[test]
    fn availability_topic_shape() {
        assert_eq!(
            availability_topic("thane-living-room"),
            "thane/thane-living-room/availability"
        );
    }
}
