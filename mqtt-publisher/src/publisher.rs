//! The MQTT Publisher: persistent broker session with
//! birth/will, retained discovery and state, rate-limited inbound dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS, Transport};
use thane_core::StatsSource;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker_url;
use crate::config::PublisherConfig;
use crate::error::PublisherError;
use crate::handler::HandlerSlot;
use crate::instance_id;
use crate::rate_limit::InboundRateLimiter;
use crate::sensors::{DeviceInfo, Sensor};
use crate::tokens::DailyTokens;
use crate::topics;

const MQTT_CHANNEL_CAPACITY: usize = 20;
const INITIAL_CONNECT_BUDGET: Duration = Duration::from_secs(30);
const KEEP_ALIVE: Duration = Duration::from_secs(30);

struct Inner {
    config: PublisherConfig,
    instance_id: Uuid,
    stats: Arc<dyn StatsSource>,
    tokens: DailyTokens,
    static_sensors: Vec<Sensor>,
    dynamic_sensors: Mutex<Vec<Sensor>>,
    handler: HandlerSlot,
    inbound_limiter: InboundRateLimiter,
    client: Mutex<Option<AsyncClient>>,
    running: Mutex<bool>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    state_task: Mutex<Option<JoinHandle<()>>>,
    connected_once: AtomicBool,
    connected_notify: Notify,
}

/// The MQTT Publisher. Cheaply cloneable; every clone shares the
/// same connection, sensor registry, and handler slot.
#[derive(Clone)]
pub struct MqttPublisher {
    inner: Arc<Inner>,
}

impl MqttPublisher {
    pub fn new(config: PublisherConfig, stats: Arc<dyn StatsSource>) -> Result<Self, PublisherError> {
        let instance_id = instance_id::load_or_create(&config.data_dir)?;
        let tokens = DailyTokens::new(config.timezone);
        let static_sensors = build_static_sensors(stats.clone(), tokens.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                instance_id,
                stats,
                tokens,
                static_sensors,
                dynamic_sensors: Mutex::new(Vec::new()),
                handler: HandlerSlot::new(),
                inbound_limiter: InboundRateLimiter::new(),
                client: Mutex::new(None),
                running: Mutex::new(false),
                event_task: Mutex::new(None),
                state_task: Mutex::new(None),
                connected_once: AtomicBool::new(false),
                connected_notify: Notify::new(),
            }),
        })
    }

    /// Registers a sensor alongside the static built-ins. Takes effect
    /// immediately if called before `start`; otherwise only from the next
    /// reconnect.
    pub async fn register_sensor(&self, sensor: Sensor) {
        self.inner.dynamic_sensors.lock().await.push(sensor);
    }

    pub async fn set_message_handler(&self, handler: Arc<dyn crate::handler::MessageHandler>) {
        self.inner.handler.set(handler).await;
    }

    /// `OnTokens(in, out)`.
    pub fn on_tokens(&self, input: u64, output: u64) {
        self.inner.tokens.on_tokens(input, output);
    }

    /// Establishes the persistent broker connection and starts the periodic
    /// state-publish loop. Waits up to 30s for the first connection before
    /// returning, falling back to background retry.
    pub async fn start(&self) -> Result<(), PublisherError> {
        {
            let mut running = self.inner.running.lock().await;
            if *running {
                return Ok(());
            }
            *running = true;
        }

        let addr = broker_url::parse(&self.inner.config.broker_url)?;
        let client_id = format!("thane-{}", self.inner.instance_id);
        let mut mqttoptions = MqttOptions::new(client_id, addr.host, addr.port);
        mqttoptions.set_keep_alive(KEEP_ALIVE);

        if let (Some(user), Some(pass)) = (&self.inner.config.username, &self.inner.config.password) {
            mqttoptions.set_credentials(user.clone(), pass.clone());
        }
        if addr.tls {
            mqttoptions.set_transport(Transport::tls_with_default_config());
        }

        let availability = topics::availability_topic(&self.inner.config.device_name);
        mqttoptions.set_last_will(LastWill::new(availability, b"offline".to_vec(), QoS::AtLeastOnce, true));

        let (client, eventloop) = AsyncClient::new(mqttoptions, MQTT_CHANNEL_CAPACITY);
        *self.inner.client.lock().await = Some(client);

        let publisher = self.clone();
        let event_task = tokio::spawn(async move { publisher.run_event_loop(eventloop).await });
        *self.inner.event_task.lock().await = Some(event_task);

        if !self.inner.config.subscriptions.is_empty() {
            info!(count = self.inner.config.subscriptions.len(), "mqtt publisher: inbound subscriptions configured");
        }

        let publisher = self.clone();
        let state_task = tokio::spawn(async move { publisher.run_state_loop().await });
        *self.inner.state_task.lock().await = Some(state_task);

        let waited = tokio::time::timeout(INITIAL_CONNECT_BUDGET, self.inner.connected_notify.notified()).await;
        if waited.is_err() {
            warn!("mqtt publisher: initial connection not established within 30s, continuing in background");
        }

        Ok(())
    }

    async fn run_event_loop(&self, mut eventloop: rumqttc::EventLoop) {
        loop {
            if !*self.inner.running.lock().await {
                return;
            }
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("mqtt publisher: connection up");
                    if let Err(e) = self.on_connection_up().await {
                        warn!(error = %e, "mqtt publisher: on-connect republish failed");
                    }
                    if !self.inner.connected_once.swap(true, Ordering::SeqCst) {
                        self.inner.connected_notify.notify_waiters();
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if self.inner.inbound_limiter.admit() {
                        self.inner
                            .handler
                            .dispatch(&publish.topic, &publish.payload)
                            .await;
                    } else {
                        debug!(topic = %publish.topic, "mqtt publisher: inbound message dropped over rate limit");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "mqtt publisher: connection error, rumqttc will retry");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Executed on every reconnect.
    async fn on_connection_up(&self) -> Result<(), PublisherError> {
        let client = self.client().await;
        let device_info = DeviceInfo::new(
            self.inner.instance_id,
            self.inner.config.device_name.clone(),
            self.inner.config.build_version.clone(),
        );

        let dynamic = self.inner.dynamic_sensors.lock().await;
        for sensor in self.inner.static_sensors.iter().chain(dynamic.iter()) {
            let payload = sensor.discovery_payload(self.inner.instance_id, &self.inner.config.device_name, device_info.clone());
            let topic = topics::discovery_topic(&self.inner.config.discovery_prefix, "sensor", &self.inner.config.device_name, &sensor.suffix);
            let body = serde_json::to_vec(&payload).unwrap_or_default();
            client
                .publish(topic.clone(), QoS::AtLeastOnce, true, body)
                .await
                .map_err(|source| PublisherError::Publish { topic, source })?;
        }
        drop(dynamic);

        let availability = topics::availability_topic(&self.inner.config.device_name);
        client
            .publish(availability.clone(), QoS::AtLeastOnce, true, b"online".to_vec())
            .await
            .map_err(|source| PublisherError::Publish { topic: availability, source })?;

        for filter in &self.inner.config.subscriptions {
            client
                .subscribe(filter, QoS::AtLeastOnce)
                .await
                .map_err(|source| PublisherError::Subscribe { filter: filter.clone(), source })?;
        }

        Ok(())
    }

    /// Periodic state publish: every
    /// `publish_interval` (floored at 5s), with an immediate publish on
    /// startup.
    async fn run_state_loop(&self) {
        self.publish_state_once().await;

        let mut interval = tokio::time::interval(self.inner.config.publish_interval);
        interval.tick().await; // first tick fires immediately; already published above
        loop {
            interval.tick().await;
            if !*self.inner.running.lock().await {
                return;
            }
            self.publish_state_once().await;
        }
    }

    async fn publish_state_once(&self) {
        let client = match self.inner.client.lock().await.clone() {
            Some(c) => c,
            None => return,
        };

        let dynamic = self.inner.dynamic_sensors.lock().await;
        for sensor in self.inner.static_sensors.iter().chain(dynamic.iter()) {
            let topic = topics::state_topic(&self.inner.config.device_name, &sensor.suffix);
            let value = sensor.value();
            if let Err(e) = client.publish(topic.clone(), QoS::AtMostOnce, true, value.into_bytes()).await {
                warn!(%topic, error = %e, "mqtt publisher: state publish failed");
                continue;
            }
            if let Some(attrs) = sensor.attributes() {
                let attrs_topic = topics::attributes_topic(&self.inner.config.device_name, &sensor.suffix);
                let body = serde_json::to_vec(&attrs).unwrap_or_default();
                let _ = client.publish(attrs_topic, QoS::AtMostOnce, true, body).await;
            }
        }
    }

    async fn client(&self) -> AsyncClient {
        self.inner
            .client
            .lock()
            .await
            .clone()
            .expect("client set before on_connection_up runs")
    }

    /// Stops the background tasks. Does not explicitly disconnect; the
    /// broker observes the last-will `offline` payload once the TCP
    /// connection drops.
    pub async fn stop(&self) {
        {
            let mut running = self.inner.running.lock().await;
            if !*running {
                return;
            }
            *running = false;
        }

        if let Some(task) = self.inner.event_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = self.inner.state_task.lock().await.take() {
            task.abort();
        }
        info!("mqtt publisher stopped");
    }
}

fn build_static_sensors(stats: Arc<dyn StatsSource>, tokens: DailyTokens) -> Vec<Sensor> {
    let uptime_stats = stats.clone();
    let version_stats = stats.clone();
    let default_model_stats = stats.clone();
    let last_request_stats = stats.clone();

    vec![
        Sensor::new("uptime", "Uptime", move || uptime_stats.uptime().as_secs().to_string())
            .with_unit("s"),
        Sensor::new("version", "Version", move || version_stats.version()),
        Sensor::new("default_model", "Default Model", move || default_model_stats.default_model()),
        Sensor::new("last_request", "Last Request", move || {
            last_request_stats
                .last_request_time()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        }),
        Sensor::new("tokens_today", "Tokens Today", move || {
            let snap = tokens.snapshot();
            (snap.input + snap.output).to_string()
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    struct FixedStats;
    impl StatsSource for FixedStats {
        fn uptime(&self) -> Duration {
            Duration::from_secs(3600)
        }
        fn version(&self) -> String {
            "0.1.0-test".to_string()
        }
        fn default_model(&self) -> String {
            "local".to_string()
        }
        fn last_request_time(&self) -> Option<DateTime<Utc>> {
            None
        }
    }

    fn config(dir: &std::path::Path) -> PublisherConfig {
        PublisherConfig {
            broker_url: "mqtt://localhost:1883".to_string(),
            username: None,
            password: None,
            device_name: "thane-test".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            publish_interval: Duration::from_secs(5),
            subscriptions: vec![],
            data_dir: dir.to_path_buf(),
            build_version: "test".to_string(),
            timezone: chrono_tz::UTC,
        }
    }

    #[tokio::test]
    async fn new_builds_five_static_sensors() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = MqttPublisher::new(config(dir.path()), Arc::new(FixedStats)).unwrap();
        assert_eq!(publisher.inner.static_sensors.len(), 5);
    }

    #[tokio::test]
    async fn register_sensor_before_start_is_visible() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = MqttPublisher::new(config(dir.path()), Arc::new(FixedStats)).unwrap();
        publisher
            .register_sensor(Sensor::new("custom", "Custom", || "1".to_string()))
            .await;
        assert_eq!(publisher.inner.dynamic_sensors.lock().await.len(), 1);
    }
}
