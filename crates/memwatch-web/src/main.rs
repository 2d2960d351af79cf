mod app;
mod handlers;
mod middleware;
mod openapi;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use memwatch_core::storage::{FileLogStore, InMemoryLogStore};
use memwatch_core::{LogAlertSink, LogStore, Monitor, MonitorConfig, SnapshotLogger};

use state::WebState;

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "memwatch-web", about = "memwatch memory observability server", version = memwatch_core::VERSION)]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "MEMWATCH_LISTEN")]
    listen: String,

    /// Directory of the persistent memory log.
    /// If not specified, logs are kept in memory and lost on exit.
    #[arg(long, env = "MEMWATCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Alert when allocated bytes exceed this fraction of system bytes (0 disables).
    #[arg(long, default_value = "0.8", env = "MEMWATCH_ALERT_THRESHOLD")]
    alert_threshold: f64,

    /// Monitoring interval in seconds.
    #[arg(long, default_value = "30", env = "MEMWATCH_MONITOR_INTERVAL")]
    monitor_interval: u64,

    /// Memory log interval in seconds.
    #[arg(long, default_value = "60", env = "MEMWATCH_LOG_INTERVAL")]
    log_interval: u64,

    /// Seconds to wait for background loops after shutdown is signalled.
    #[arg(long, default_value = "2")]
    shutdown_grace: u64,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("memwatch_web=info,memwatch_core=info")),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args));
}

async fn async_main(args: Args) {
    if args.monitor_interval == 0 || args.log_interval == 0 {
        error!("--monitor-interval and --log-interval must be positive");
        process::exit(1);
    }
    let config = MonitorConfig::new(
        args.alert_threshold,
        Duration::from_secs(args.monitor_interval),
        Duration::from_secs(args.log_interval),
    );
    info!(
        version = memwatch_core::VERSION,
        threshold = config.alert_threshold,
        monitor_interval_s = args.monitor_interval,
        log_interval_s = args.log_interval,
        "starting memwatch-web"
    );

    let monitor = Arc::new(Monitor::new(state::build_source(), config.alert_threshold));
    monitor.set_alert_sink(Arc::new(LogAlertSink));

    let store: Arc<dyn LogStore> = match args.data_dir {
        Some(ref dir) => match FileLogStore::open(dir) {
            Ok(store) => {
                info!(path = %store.path().display(), "memory log opened");
                Arc::new(store)
            }
            Err(e) => {
                error!(path = %dir.display(), error = %e, "failed to open memory log");
                process::exit(1);
            }
        },
        None => {
            warn!("no --data-dir given, memory logs are kept in memory only");
            Arc::new(InMemoryLogStore::new())
        }
    };
    let logger = Arc::new(SnapshotLogger::new(monitor.clone(), store));

    // One token stops both loops.
    let cancel = CancellationToken::new();
    let (monitor_interval, log_interval) = (config.monitor_interval, config.log_interval);
    let monitor_task = {
        let monitor = monitor.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { monitor.run_periodic(cancel, monitor_interval).await })
    };
    let logger_task = {
        let logger = logger.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { logger.run_periodic(cancel, log_interval).await })
    };

    let app = app::build_router(WebState { monitor, logger })
        .into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
    {
        error!(error = %e, "server error");
    }

    cancel.cancel();
    let grace = Duration::from_secs(args.shutdown_grace);
    let drained = tokio::time::timeout(grace, async {
        let _ = monitor_task.await;
        let _ = logger_task.await;
    })
    .await;
    match drained {
        Ok(()) => info!("shutdown complete"),
        Err(_) => warn!(grace_s = args.shutdown_grace, "background loops did not stop within grace period"),
    }
}

/// Resolves on Ctrl-C or SIGTERM and cancels the background loops.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping");
    cancel.cancel();
}
