//! triage-server: photo triage relocation service
//!
//! Long-running service that:
//! - Accepts lifecycle transitions for images over HTTP
//! - Relocates image files in S3 on a background worker pool
//! - Enriches approved images through the content analyzer
//! - Reconciles project image counts when projects are listed

use std::time::Duration;

use tower_http::trace::TraceLayer;
use triage_server::core::BackgroundTasks;
use triage_server::dispatch::RelocationWorker;
use triage_server::logger::init_logger;
use triage_server::{AppState, Config, api};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long each background task gets to stop on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    init_logger(config.log_dir.as_deref());

    tracing::info!("Starting triage-server (env: {})", config.environment);

    let (state, deliveries) = AppState::new(&config).await?;

    let mut tasks = BackgroundTasks::new();
    let shutdown = tasks.shutdown_token();
    let worker = RelocationWorker::new(state.clone());
    tasks.spawn("relocation_worker", worker.run(deliveries, shutdown));

    let app = api::create_router(state).layer(TraceLayer::new_for_http());

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("triage-server HTTP listening on {http_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.shutdown(SHUTDOWN_GRACE).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
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

    tracing::info!("Shutdown signal received");
}
