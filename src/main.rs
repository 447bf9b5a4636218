// Allow panic/unwrap/expect in tests (denied globally via Cargo.toml lints)
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        clippy::arithmetic_side_effects,
        clippy::indexing_slicing
    )
)]

use clap::Parser;
use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use tunnel_logging::bridge::tracing_directive;
use tunnel_logging::{
    find_default_config, ContextLogger, Fields, Level, LogConfig, LogOverrides, Logger,
    LoggerLayer, ShutdownError, TerminalFormat,
};

/// Tunnel daemon bootstrap: sets up logging and announces the tunnel.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML config file (default: first of ~/.cloudflared/config.yml,
    /// ~/.cloudflare-warp/config.yml, ~/cloudflare-warp/config.yml,
    /// /etc/cloudflared/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum level to log: debug, info, warn or error
    #[arg(long, env = "TUNNEL_LOGLEVEL")]
    loglevel: Option<Level>,

    /// Append JSON records to this file
    #[arg(long, env = "TUNNEL_LOGFILE")]
    logfile: Option<PathBuf>,

    /// Write JSON records to a size-rotated file in this directory
    #[arg(long, env = "TUNNEL_LOGDIRECTORY")]
    log_directory: Option<PathBuf>,

    /// Do not log to the terminal
    #[arg(long)]
    no_terminal: bool,

    /// Terminal output format: default or json
    #[arg(long, env = "TUNNEL_LOG_OUTPUT")]
    output: Option<TerminalFormat>,

    /// Rotate the directory log after this many bytes
    #[arg(long)]
    rotate_after_bytes: Option<u64>,

    /// Tunnel identifier attached to every tunnel record (default: random)
    #[arg(long, env = "TUNNEL_ID")]
    tunnel_id: Option<String>,

    /// Emit a heartbeat record at this interval, e.g. "30s"
    #[arg(long)]
    heartbeat: Option<humantime::Duration>,

    /// Emit this many request records from concurrent tasks at startup
    #[arg(long, default_value_t = 0)]
    synthetic_requests: u32,
}

impl Args {
    fn overrides(&self) -> LogOverrides {
        LogOverrides {
            loglevel: self.loglevel,
            logfile: self.logfile.clone(),
            log_directory: self.log_directory.clone(),
            no_terminal: self.no_terminal,
            output: self.output,
            rotate_after_bytes: self.rotate_after_bytes,
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<LogConfig> {
    let path = explicit.map(Path::to_path_buf).or_else(find_default_config);
    match path {
        Some(path) => Ok(LogConfig::load(&path)?),
        None => Ok(LogConfig::default()),
    }
}

/// Forward `tracing` events from dependencies into the logger.
fn install_tracing(logger: &Logger) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_directive(logger.min_level())));
    tracing_subscriber::registry()
        .with(LoggerLayer::new(logger.clone()).with_filter(env_filter))
        .with(ErrorLayer::default())
        .try_init()?;
    Ok(())
}

fn spawn_heartbeat(
    tunnel: ContextLogger,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut beats: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    beats = beats.saturating_add(1);
                    tunnel.info("Tunnel heartbeat", Fields::new().with("beats", beats));
                }
                _ = stop.changed() => break,
            }
        }
    })
}

async fn run_synthetic_requests(tunnel: &ContextLogger, count: u32) {
    let mut tasks = JoinSet::new();
    for seq in 0..count {
        let tunnel = tunnel.clone();
        tasks.spawn(async move {
            tunnel.info(
                "Request served",
                Fields::new()
                    .with("seq", seq)
                    .with("path", format!("/synthetic/{seq}"))
                    .with("status", 200_u16),
            );
        });
    }
    let mut failed: u32 = 0;
    while let Some(joined) = tasks.join_next().await {
        if joined.is_err() {
            failed = failed.saturating_add(1);
        }
    }
    tunnel.info(
        "Synthetic requests complete",
        Fields::new().with("count", count).with("failedTasks", failed),
    );
}

/// Listeners for the signals that stop the daemon gracefully.
///
/// Installed before the startup marker so a signal sent as soon as the
/// marker appears is already handled.
struct ShutdownSignals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Wait for SIGINT (Ctrl-C) or, on unix, SIGTERM. Returns the signal name.
    #[cfg(unix)]
    async fn recv(mut self) -> Result<&'static str> {
        tokio::select! {
            interrupted = tokio::signal::ctrl_c() => {
                interrupted?;
                Ok("SIGINT")
            }
            _ = self.terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    async fn recv(self) -> Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT")
    }
}

fn report_shutdown_error(err: &ShutdownError) {
    eprintln!("Error: {err}");
    for sink_err in &err.errors {
        eprintln!("  {sink_err}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre error hooks for colored error output
    color_eyre::install()?;

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?.with_overrides(args.overrides());
    let (logger, sink_errors) = config.build_logger();
    install_tracing(&logger)?;
    let signals = ShutdownSignals::install()?;

    let tunnel_id = args
        .tunnel_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let tunnel = logger.with_fields(Fields::new().with("tunnelID", tunnel_id));

    // Must be the first record on the terminal.
    tunnel.info("Starting tunnel", Fields::new());
    for err in &sink_errors {
        logger.error(
            "Failed to set up log sink",
            Fields::new().with("error", err.to_string()),
        );
    }
    logger.debug(
        "Logging configured",
        Fields::new()
            .with("sinks", logger.sink_names().join(","))
            .with("loglevel", logger.min_level().as_str()),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let heartbeat = args
        .heartbeat
        .map(|period| *period)
        .filter(|period| !period.is_zero())
        .map(|period| spawn_heartbeat(tunnel.clone(), period, stop_rx));
    if args.synthetic_requests > 0 {
        run_synthetic_requests(&tunnel, args.synthetic_requests).await;
    }

    let signal = signals.recv().await?;
    tracing::info!(signal, "Initiating graceful shutdown");
    stop_tx.send(true).ok();
    if let Some(handle) = heartbeat {
        handle.await.ok();
    }
    tunnel.info("Tunnel stopped", Fields::new());

    // Logging failures never change the exit status.
    if let Err(err) = logger.shutdown() {
        report_shutdown_error(&err);
    }
    Ok(())
}
