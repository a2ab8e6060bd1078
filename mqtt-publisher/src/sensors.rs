//! Static and dynamic HA sensor entities.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::topics;

/// Shared device block every sensor's discovery payload references.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub identifiers: [String; 1],
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub sw_version: String,
}

impl DeviceInfo {
    pub fn new(instance_id: Uuid, device_name: String, sw_version: String) -> Self {
        Self {
            identifiers: [instance_id.to_string()],
            name: device_name,
            manufacturer: "Hollow Oak",
            model: "Thane AI Agent",
            sw_version,
        }
    }
}

/// HA MQTT discovery payload for one sensor entity.
///
/// `has_entity_name=true` plus `object_id=<suffix>` is what prevents HA
/// from doubling the device name into the entity name.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub has_entity_name: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<String>,
    pub device: DeviceInfo,
}

/// One sensor entity, static or dynamically registered.
#[derive(Clone)]
pub struct Sensor {
    pub suffix: String,
    pub friendly_name: String,
    pub device_class: Option<String>,
    pub unit_of_measurement: Option<String>,
    pub has_attributes: bool,
    value_fn: Arc<dyn Fn() -> String + Send + Sync>,
    attributes_fn: Option<Arc<dyn Fn() -> serde_json::Value + Send + Sync>>,
}

impl Sensor {
    pub fn new(
        suffix: impl Into<String>,
        friendly_name: impl Into<String>,
        value_fn: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            suffix: suffix.into(),
            friendly_name: friendly_name.into(),
            device_class: None,
            unit_of_measurement: None,
            has_attributes: false,
            value_fn: Arc::new(value_fn),
            attributes_fn: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    pub fn with_attributes(mut self, attributes_fn: impl Fn() -> serde_json::Value + Send + Sync + 'static) -> Self {
        self.has_attributes = true;
        self.attributes_fn = Some(Arc::new(attributes_fn));
        self
    }

    pub fn value(&self) -> String {
        (self.value_fn)()
    }

    pub fn attributes(&self) -> Option<serde_json::Value> {
        self.attributes_fn.as_ref().map(|f| f())
    }

    pub fn discovery_payload(&self, instance_id: Uuid, device: &str, device_info: DeviceInfo) -> DiscoveryPayload {
        DiscoveryPayload {
            name: self.friendly_name.clone(),
            unique_id: format!("{instance_id}_{}", self.suffix),
            object_id: self.suffix.clone(),
            state_topic: topics::state_topic(device, &self.suffix),
            availability_topic: topics::availability_topic(device),
            has_entity_name: true,
            device_class: self.device_class.clone(),
            unit_of_measurement: self.unit_of_measurement.clone(),
            json_attributes_topic: self
                .has_attributes
                .then(|| topics::attributes_topic(device, &self.suffix)),
            device: device_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_payload_sets_entity_naming_fields() {
        let sensor = Sensor::new("uptime", "Uptime", || "42".to_string());
        let device_info = DeviceInfo::new(Uuid::nil(), "thane".to_string(), "0.1.0".to_string());
        let payload = sensor.discovery_payload(Uuid::nil(), "thane", device_info);

        assert!(payload.has_entity_name);
        assert_eq!(payload.object_id, "uptime");
        assert_eq!(payload.unique_id, format!("{}_uptime", Uuid::nil()));
    }

    #[test]
    fn value_fn_is_invoked_live() {
        let sensor = Sensor::new("counter", "Counter", || "7".to_string());
        assert_eq!(sensor.value(), "7");
    }
}
