//! Thane daemon entry point: loads configuration, constructs every
//! subsystem against concrete or stub collaborators, starts them, and waits
//! for `Ctrl-C` to tear them down in order.

mod collaborators;
mod executor;
mod settings;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thane_core::RuntimeStats;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collaborators::{EchoAgentRunner, NullContactResolver, NullSessionRotator};
use crate::executor::AgentExecutor;

const GRACE_PERIOD: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let explicit_path = std::env::args().nth(1).map(PathBuf::from);
    let config = thane_config::load(explicit_path.as_deref()).context("loading configuration")?;

    let _log_guard = thane_config::tracing_init::init(&config.log_level, &config.log_format, None);
    info!(data_dir = %config.data_dir.display(), "thane starting");

    let agent_settings: settings::AgentSettings = settings::section(&config.extra, "agent");
    let stats = Arc::new(RuntimeStats::new(env!("CARGO_PKG_VERSION"), agent_settings.default_model.clone()));
    let runner = Arc::new(EchoAgentRunner::new(stats.clone()));

    let router = router::Router::new(router::RouterConfig {
        roster: config.models.clone(),
        default_model: agent_settings.default_model.clone(),
        max_audit: agent_settings.max_audit,
        local_first: agent_settings.local_first,
    });
    info!(max_quality = router.max_quality(), "router ready");

    std::fs::create_dir_all(&config.data_dir).context("creating data_dir")?;

    let store: Arc<dyn scheduler::Store> = Arc::new(
        scheduler::SqliteStore::open(config.data_dir.join("scheduler.db")).context("opening scheduler store")?,
    );
    let executor: Arc<dyn scheduler::Executor> = Arc::new(AgentExecutor::new(runner.clone()));
    let task_scheduler = scheduler::Scheduler::new(store, executor);
    task_scheduler.start().await.context("starting scheduler")?;

    let metacognitive_settings: settings::MetacognitiveSettings = settings::section(&config.extra, "metacognitive");
    let metacognitive_loop = build_metacognitive_loop(&config, &metacognitive_settings, runner.clone())?;
    metacognitive_loop.start().await;

    let signal_settings: settings::SignalSettings = settings::section(&config.extra, "signal");
    let signal_handle = start_signal_bridge(&signal_settings, runner.clone())?;

    let mqtt_publisher = match &config.mqtt {
        Some(mqtt) => {
            let publisher = build_mqtt_publisher(&config, mqtt, stats.clone())?;
            publisher.start().await.context("starting mqtt publisher")?;
            Some(publisher)
        }
        None => {
            info!("no mqtt section configured, mqtt publisher disabled");
            None
        }
    };

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received, stopping subsystems");

    let shutdown = async move {
        task_scheduler.stop().await;
        metacognitive_loop.stop().await;
        if let Some((bridge_cancel, client)) = signal_handle {
            bridge_cancel.cancel();
            client.shutdown().await;
        }
        if let Some(publisher) = mqtt_publisher {
            publisher.stop().await;
        }
    };

    if tokio::time::timeout(GRACE_PERIOD, shutdown).await.is_err() {
        warn!("shutdown grace period elapsed before all subsystems drained");
    }

    info!("thane stopped");
    Ok(())
}

fn build_metacognitive_loop(
    config: &thane_config::Config,
    settings: &settings::MetacognitiveSettings,
    runner: Arc<dyn thane_core::AgentRunner>,
) -> anyhow::Result<metacognitive::MetacognitiveLoop> {
    let min_sleep = metacognitive::parse_duration(&settings.min_sleep)
        .context("parsing metacognitive.min_sleep")?;
    let max_sleep = metacognitive::parse_duration(&settings.max_sleep)
        .context("parsing metacognitive.max_sleep")?;
    let default_sleep = metacognitive::parse_duration(&settings.default_sleep)
        .context("parsing metacognitive.default_sleep")?;

    let loop_config = metacognitive::MetacognitiveConfig {
        enabled: settings.enabled,
        state_file: config.data_dir.join(&settings.state_file),
        min_sleep,
        max_sleep,
        default_sleep,
        jitter: settings.jitter,
        supervisor_probability: settings.supervisor_probability,
        quality_floor: settings.quality_floor,
        supervisor_quality_floor: settings.supervisor_quality_floor,
    }
    .validate()
    .context("validating metacognitive config")?;

    Ok(metacognitive::MetacognitiveLoop::new(loop_config, runner))
}

/// Starts the Signal Client + Bridge when configured. Returns the bridge's
/// cancellation token and client handle for shutdown, or `None` when the
/// `signal` section is absent or disabled.
fn start_signal_bridge(
    settings: &settings::SignalSettings,
    runner: Arc<dyn thane_core::AgentRunner>,
) -> anyhow::Result<Option<(CancellationToken, signal_bridge::SignalClient)>> {
    if !settings.enabled {
        info!("signal bridge disabled by config");
        return Ok(None);
    }

    let (client, inbound) =
        signal_bridge::SignalClient::spawn(&settings.binary, &settings.args).context("spawning signal-cli")?;

    let bridge_config = signal_bridge::BridgeConfig {
        rate_limit: settings.rate_limit,
        idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
        attachments_src_dir: settings.attachments_src_dir.clone(),
        attachments_dest_dir: settings.attachments_dest_dir.clone(),
        max_attachment_bytes: settings.max_attachment_bytes,
    };

    let bridge = Arc::new(signal_bridge::SignalBridge::new(
        client.clone(),
        runner,
        Some(Arc::new(NullSessionRotator)),
        Some(Arc::new(NullContactResolver)),
        bridge_config,
    ));

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        bridge.run(inbound, task_cancel).await;
    });

    info!("signal bridge started");
    Ok(Some((cancel, client)))
}

fn build_mqtt_publisher(
    config: &thane_config::Config,
    mqtt: &thane_config::MqttConfig,
    stats: Arc<RuntimeStats>,
) -> anyhow::Result<mqtt_publisher::MqttPublisher> {
    let timezone = chrono_tz::Tz::from_str(&config.timezone).unwrap_or(chrono_tz::UTC);

    let publisher_config = mqtt_publisher::PublisherConfig {
        broker_url: mqtt.broker_url.clone(),
        username: mqtt.username.clone(),
        password: mqtt.password.clone(),
        device_name: mqtt.device_name.clone(),
        discovery_prefix: mqtt.discovery_prefix.clone(),
        publish_interval: Duration::from_secs(mqtt.publish_interval),
        subscriptions: mqtt.subscriptions.clone(),
        data_dir: config.data_dir.clone(),
        build_version: env!("CARGO_PKG_VERSION").to_string(),
        timezone,
    }
    .with_floored_interval();

    mqtt_publisher::MqttPublisher::new(publisher_config, stats).context("constructing mqtt publisher")
}
