//! proxymock - CLI entry point

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use proxymock::logging::{self, LogFormat};
use proxymock::{Config, ServiceCoordinator};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "proxymock",
    about = "Per-service reverse proxy answering from mock files and capturing real exchanges",
    version
)]
struct Args {
    /// Path to the configuration file (YAML or JSON)
    #[arg(short, long, env = "PROXYMOCK_CONFIG", default_value = "proxymock.yaml")]
    config: PathBuf,

    /// Directory holding `<service>*.json` mock files
    #[arg(short, long, env = "PROXYMOCK_MOCK_DIR")]
    mock_dir: Option<PathBuf>,

    /// Root directory for captured exchanges
    #[arg(short, long, env = "PROXYMOCK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Re-read every mock file on every request
    #[arg(long, env = "PROXYMOCK_NO_FILE_CACHE")]
    no_file_cache: bool,

    /// Also append log lines to this file
    #[arg(long, env = "PROXYMOCK_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, env = "PROXYMOCK_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.mock_dir {
            config.mock_directory = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.log_directory = dir.clone();
        }
        if self.no_file_cache {
            config.use_file_cache = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match logging::init(args.log_format, "info", args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!(path = ?args.config, "Loading configuration");
    let mut config = Config::from_file(&args.config)?;
    args.apply_overrides(&mut config);

    if args.validate {
        println!(
            "Configuration is valid ({} services defined)",
            config.services.len()
        );
        return Ok(());
    }

    info!(
        "Starting {} v{} (mocks: {}, captures: {}, file cache: {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.mock_directory.display(),
        config.log_directory.display(),
        config.use_file_cache
    );

    let coordinator = ServiceCoordinator::new(config)?;
    let listening = coordinator.start().await?;
    if listening == 0 {
        anyhow::bail!("No service could bind its port");
    }

    shutdown_signal().await;
    info!("Shutting down");
    coordinator.shutdown().await;
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Cannot install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxymock::ServiceConfig;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from([
            "proxymock",
            "-c",
            "conf.yaml",
            "--mock-dir",
            "mocks",
            "--no-file-cache",
            "--log-format",
            "json",
            "--log-file",
            "Logs/proxymock.log",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("conf.yaml"));
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.log_file, Some(PathBuf::from("Logs/proxymock.log")));

        let mut config = Config::with_services(vec![ServiceConfig::new("a", "http://a")]);
        args.apply_overrides(&mut config);
        assert_eq!(config.mock_directory, PathBuf::from("mocks"));
        assert_eq!(config.log_directory, PathBuf::from("Logs"));
        assert!(!config.use_file_cache);
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["proxymock"]).unwrap();
        assert_eq!(args.log_format, LogFormat::Text);
        assert!(!args.validate);
        assert!(args.log_file.is_none());
    }
}
