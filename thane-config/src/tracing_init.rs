//! Global `tracing` subscriber installation for the `thane` binary. Selectable between `"pretty"` and `"json"` output via
//! `log_format`, an `EnvFilter` built from `log_level`, and an optional
//! `tracing-appender` non-blocking file writer.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the process-wide subscriber. Returns the appender's `WorkerGuard`
/// when `log_file` is `Some`; the caller must keep it alive for the process
/// lifetime or buffered log lines are dropped on exit.
pub fn init(log_level: &str, log_format: &str, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "thane.log".to_string());
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (nb, guard) = tracing_appender::non_blocking(appender);
            (Some(nb), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter);

    match (log_format, non_blocking) {
        ("json", Some(writer)) => {
            registry
                .with(fmt::layer().json().with_writer(writer))
                .init();
        }
        ("json", None) => {
            registry.with(fmt::layer().json()).init();
        }
        (_, Some(writer)) => {
            registry.with(fmt::layer().with_writer(writer)).init();
        }
        (_, None) => {
            registry.with(fmt::layer()).init();
        }
    }

    guard
}
