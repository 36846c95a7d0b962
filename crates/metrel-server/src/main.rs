//! metrel-server — central metrics collector.
//!
//! Receives metric updates over HTTP, holds them in a concurrent in-memory
//! store, and persists snapshots to a file either on a schedule or on every
//! update (write-through). On startup the store can be restored from the
//! last snapshot; on shutdown the scheduled flush performs one final save.

mod background;
mod handlers;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use metrel_core::store::{FileSaver, MemStore, SaverConfig, Storage};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Metrics collector server.
#[derive(Parser)]
#[command(name = "metrel-server", about = "Metrics collector server", version = metrel_core::VERSION)]
struct Args {
    /// Listen address (host:port).
    #[arg(short = 'a', long, default_value = "localhost:8080", env = "ADDRESS")]
    listen: String,

    /// Snapshot flush interval in seconds. 0 flushes on every update.
    #[arg(short = 'i', long, default_value = "300", env = "STORE_INTERVAL")]
    store_interval: u64,

    /// Snapshot file path.
    #[arg(
        short = 'f',
        long,
        default_value = "/tmp/metrel-db.json",
        env = "FILE_STORAGE_PATH"
    )]
    file_storage_path: PathBuf,

    /// Restore metrics from the snapshot file on startup.
    #[arg(
        short = 'r',
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "RESTORE"
    )]
    restore: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
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
        .add_directive(format!("metrel_server={}", level).parse().unwrap())
        .add_directive(format!("metrel_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

fn router(store: Arc<MemStore>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/update/", post(handlers::update_json))
        .route("/update/{kind}/{name}/{value}", post(handlers::update_path))
        .route("/value/", post(handlers::value_json))
        .route("/value/{kind}/{name}", get(handlers::value_path))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .with_state(store)
}

async fn async_main(args: Args) {
    info!("metrel-server {} starting", metrel_core::VERSION);

    let config = SaverConfig {
        store_interval: Duration::from_secs(args.store_interval),
        path: args.file_storage_path.clone(),
        restore: args.restore,
    };
    info!(
        "Config: listen={}, store_interval={}s, file={}, restore={}",
        args.listen,
        args.store_interval,
        config.path.display(),
        config.restore
    );

    let store = if config.write_through() {
        info!("write-through persistence enabled");
        MemStore::with_write_through(FileSaver::new(&config.path))
    } else {
        MemStore::new()
    };

    if config.restore {
        let saver = FileSaver::new(&config.path);
        match saver.load() {
            Ok(metrics) => {
                info!(count = metrics.len(), "restored metrics from snapshot");
                store.restore(metrics);
            }
            Err(e) => {
                // An unreadable snapshot is not fatal; the store starts empty.
                warn!(error = %e, path = %config.path.display(), "snapshot restore failed");
            }
        }
    }
    let store = Arc::new(store);

    let token = CancellationToken::new();
    let flush_task = if config.write_through() {
        None
    } else {
        Some(tokio::spawn(background::flush_loop(
            store.clone(),
            FileSaver::new(&config.path),
            config.store_interval,
            token.clone(),
        )))
    };

    let listener = match tokio::net::TcpListener::bind(&args.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %args.listen, error = %e, "failed to bind listen address");
            process::exit(1);
        }
    };
    info!(addr = %args.listen, "listening");

    let serve_result = axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown_signal(token.clone()))
        .await;
    if let Err(e) = serve_result {
        error!(error = %e, "server error");
    }

    if let Some(task) = flush_task {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => info!("flush loop stopped"),
            Ok(Err(e)) => error!(error = %e, "flush loop panicked"),
            Err(_) => {
                error!(
                    "flush loop did not stop within {}s",
                    SHUTDOWN_TIMEOUT.as_secs()
                );
                process::exit(1);
            }
        }
    }

    info!("shutdown complete");
}

/// Resolves when a shutdown signal arrives, cancelling every scheduled task.
/// axum uses the same future to begin its graceful shutdown.
async fn shutdown_signal(token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
    token.cancel();
}
