mod cache;
mod clients;
mod config;
mod error;
mod helpers;
mod models;
mod query;
mod routes;
mod sync;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use cache::ResourceStore;
use clients::KubeClient;
use query::QueryService;
use sync::Synchronizer;

#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kubecache=info")),
        )
        .init();

    let config_path = std::env::args()
        .skip(1)
        .zip(std::env::args().skip(2))
        .find_map(|(k, v)| (k == "-config" || k == "--config").then_some(v))
        .or_else(|| std::env::args().nth(1).filter(|a| !a.starts_with('-')))
        .unwrap_or_else(|| "/etc/kubecache/config.yaml".to_string());

    let cfg = config::Config::load(&PathBuf::from(&config_path)).unwrap_or_else(|e| {
        eprintln!("error loading config: {}", e);
        std::process::exit(1);
    });
    // validated by Config::load
    let kinds = cfg.tracked_kinds().unwrap_or_default();

    let store = ResourceStore::open(&cfg.db_path).unwrap_or_else(|e| {
        eprintln!("error opening cache {}: {}", cfg.db_path.display(), e);
        std::process::exit(1);
    });

    let source = KubeClient::discover(&cfg).await.map(Arc::new);
    if source.is_none() {
        warn!("no cluster available, serving cached data only");
    }

    let synchronizer = Synchronizer::new(
        store.clone(),
        source,
        kinds,
        Duration::from_secs(cfg.refresh_interval_secs),
    );
    synchronizer.start().await;

    let state = AppState {
        query: QueryService::new(store),
    };
    let router = routes::build_router(state);

    let listen_addr = cfg.listen_addr();
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {}: {}", listen_addr, e);
        std::process::exit(1);
    });

    info!("kubecache listening on {}", listen_addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if synchronizer.is_running().await {
        synchronizer.stop().await;
    }

    if let Err(e) = served {
        eprintln!("server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
