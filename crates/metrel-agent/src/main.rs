//! metrel-agent — process metrics collection agent.
//!
//! Samples runtime metrics from /proc on a poll interval and pushes the
//! current snapshot to a collector server on an independent report interval.
//! Both loops run until a shutdown signal cancels them.

mod reporter;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

use metrel_core::collector::{Collector, RealFs};
use metrel_core::store::{MemStore, Storage};

use reporter::Reporter;

/// Process metrics collection agent.
#[derive(Parser)]
#[command(name = "metrel-agent", about = "Process metrics collection agent", version = metrel_core::VERSION)]
struct Args {
    /// Collector server address (host:port).
    #[arg(
        short,
        long,
        default_value = "localhost:8080",
        env = "ADDRESS",
        value_parser = parse_address
    )]
    address: String,

    /// Sampling interval in seconds.
    #[arg(short, long, default_value = "2", env = "POLL_INTERVAL")]
    poll_interval: u64,

    /// Reporting interval in seconds.
    #[arg(short, long, default_value = "10", env = "REPORT_INTERVAL")]
    report_interval: u64,

    /// Path to /proc filesystem.
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Validates a `host:port` pair. Startup configuration errors are fatal;
/// clap exits non-zero when this rejects the value.
fn parse_address(s: &str) -> Result<String, String> {
    match s.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => port
            .parse::<u16>()
            .map(|_| s.to_string())
            .map_err(|_| format!("invalid port in address '{}'", s)),
        _ => Err(format!("address '{}' is not host:port", s)),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("metrel_agent={}", level).parse().unwrap())
        .add_directive(format!("metrel_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("metrel-agent {} starting", metrel_core::VERSION);
    info!(
        "Config: address={}, poll={}s, report={}s",
        args.address, args.poll_interval, args.report_interval
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(run(args));
}

async fn run(args: Args) {
    let store = Arc::new(MemStore::new());
    let collector = Collector::new(RealFs::new(), store.clone(), &args.proc_path);
    let reporter = Reporter::new(&args.address);

    let token = CancellationToken::new();

    let collect_task = tokio::spawn(collect_loop(
        collector,
        Duration::from_secs(args.poll_interval),
        token.clone(),
    ));
    let report_task = tokio::spawn(report_loop(
        reporter,
        store,
        Duration::from_secs(args.report_interval),
        token.clone(),
    ));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
    token.cancel();

    let _ = collect_task.await;
    let _ = report_task.await;
    info!("shutdown complete");
}

/// Samples on every tick until cancelled. No final sample on shutdown: the
/// store already holds last-known values.
async fn collect_loop(
    collector: Collector<RealFs, MemStore>,
    period: Duration,
    token: CancellationToken,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("collector loop cancelled");
                return;
            }
            _ = tick.tick() => {
                collector.collect();
            }
        }
    }
}

/// Pushes the current snapshot on every tick until cancelled.
async fn report_loop(
    reporter: Reporter,
    store: Arc<MemStore>,
    period: Duration,
    token: CancellationToken,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first interval tick fires immediately; skip it so the first report
    // carries at least one full poll cycle of data.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("reporter loop cancelled");
                return;
            }
            _ = tick.tick() => {
                let metrics = store.snapshot();
                debug!(count = metrics.len(), "reporting snapshot");
                reporter.send_all(&metrics).await;
            }
        }
    }
}
