mod config;
mod http;
mod preload;

use clap::Parser;
use config::Config;
use std::sync::Arc;
use tracing::{error, info};
use verdict_core::{ModelRegistry, RegressionParser};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Parse config
    let config = Config::parse();
    config.validate()?;

    info!("Starting Verdict server v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP: {}", config.http_addr);

    let registry = Arc::new(ModelRegistry::new(Arc::new(RegressionParser)));

    if let Some(dir) = &config.model_dir {
        info!("Preloading models from {:?}...", dir);
        let loaded = preload::preload_models(&registry, dir)?;
        info!("Preloaded {} model(s)", loaded);
    }

    let stats = registry.stats()?;
    info!(
        "Registry ready: {} models, {} versions",
        stats.model_count, stats.version_count
    );

    // Start HTTP server
    let http_task = {
        let app_state =
            http::AppState::new(registry.clone(), config.eval_timeout(), config.max_model_size);
        let app = http::create_router(app_state);
        let listener = tokio::net::TcpListener::bind(config.http_addr).await?;

        tokio::spawn(async move {
            info!("Starting HTTP server on {}", config.http_addr);

            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server failed: {}", e);
            }
        })
    };

    info!("Verdict server ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, terminating...");

    http_task.abort();

    Ok(())
}
