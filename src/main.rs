//! Lookalike HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use lookalike::config::Config;
use lookalike::engine::SearchEngine;
use lookalike::extraction::FeaturePipeline;
use lookalike::gateway::{HandlerState, create_router_with_state};
use lookalike::metadata::InMemoryMetadataStore;
use lookalike::storage::SnapshotStore;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        snapshot = %config.snapshot_path.display(),
        "Lookalike starting"
    );

    let engine_config = config.engine_config();
    if engine_config.pipeline.model_path.is_none() {
        tracing::warn!(
            "No LOOKALIKE_MODEL_PATH configured, semantic features use the stub projection"
        );
    }
    let extractor = Arc::new(FeaturePipeline::new(engine_config.pipeline.clone())?);
    let metadata = Arc::new(InMemoryMetadataStore::new());
    let store = SnapshotStore::new(config.snapshot_path.clone());

    let engine = if store.exists() {
        tracing::info!("Restoring index from snapshot...");
        match SearchEngine::from_snapshot(
            engine_config.clone(),
            Arc::clone(&extractor),
            Arc::clone(&metadata),
            &store,
        ) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!("Failed to restore snapshot: {}. Starting empty.", e);
                SearchEngine::with_components(engine_config, extractor, metadata)?
            }
        }
    } else {
        SearchEngine::with_components(engine_config, extractor, metadata)?
    };
    let engine = Arc::new(engine);
    let generation = engine.index().pin();
    if generation.is_trained() {
        tracing::info!(items = generation.len(), "Index ready");
    } else {
        tracing::warn!(
            variant = generation.variant().name(),
            "Index is untrained, POST samples to /v1/index/samples then /v1/index/train"
        );
    }

    let tuner = engine.spawn_tuner();

    let app = create_router_with_state(HandlerState::new(Arc::clone(&engine)));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tuner.shutdown().await;

    tracing::info!("Saving index snapshot...");
    match engine.save_snapshot(&store) {
        Ok(bytes) => tracing::info!(bytes, "Snapshot saved"),
        Err(e) => tracing::error!("Failed to save snapshot: {}", e),
    }

    tracing::info!("Lookalike shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("LOOKALIKE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
