//! Tracing subscriber setup.
//!
//! Logs always go to stdout. With a log file, the same lines are also
//! appended to it through a non-blocking writer.

use std::path::Path;

use clap::ValueEnum;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Flushes the log file when dropped. Keep it alive until exit.
#[must_use]
pub struct LogGuard(#[allow(dead_code)] Option<WorkerGuard>);

/// Filter from `RUST_LOG`, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);
    match format {
        LogFormat::Text => layer.with_target(false).boxed(),
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
    }
}

/// Non-blocking writer appending to `path`, creating its directory.
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), anyhow::Error> {
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Log file path {} has no file name", path.display()))?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(directory).map_err(|e| {
        anyhow::anyhow!("Failed to create log directory {}: {e}", directory.display())
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {e}", path.display()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(
    format: LogFormat,
    default_directive: &str,
    log_file: Option<&Path>,
) -> Result<LogGuard, anyhow::Error> {
    let mut layers = vec![fmt_layer(format, std::io::stdout, true)];
    let mut guard = None;
    if let Some(path) = log_file {
        let (writer, worker) = file_writer(path)?;
        layers.push(fmt_layer(format, writer, false));
        guard = Some(worker);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(default_directive))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;
    Ok(LogGuard(guard))
}
