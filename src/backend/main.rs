/**
 * RoadRescue Live Server Entry Point
 *
 * Starts the Axum server with the live-update pipeline. On Ctrl-C or
 * SIGTERM the pipeline is torn down before connections drain; it is torn
 * down again (a no-op by then) on every other exit path.
 */

use roadrescue_live::backend::create_app;
use roadrescue_live::backend::LivePipeline;
use roadrescue_live::shared::LiveConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = LiveConfig::from_env()?;
    tracing::info!("[Startup] Watching {}.{}", config.database, config.collection);

    let (app, pipeline) = create_app(&config).await;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            pipeline.shutdown().await;
            return Err(e.into());
        }
    };
    tracing::info!("[Startup] Listening on {}", addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pipeline.clone()))
        .await;

    pipeline.shutdown().await;
    result?;
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM, then stop the live pipeline
async fn shutdown_signal(pipeline: LivePipeline) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("[Startup] Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("[Startup] Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("[Startup] Shutdown signal received");
    pipeline.shutdown().await;
}
