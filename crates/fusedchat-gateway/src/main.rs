use std::sync::Arc;
use std::time::Duration;

use fusedchat_gateway::http::{self, AppState};
use fusedchat_gateway::users::JsonUserStore;
use fusedchat_proto::config::Config;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup file + console logging
    let data_dir = fusedchat_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("gateway.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let console_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,fusedchat_gateway=debug,hyper_util=warn,reqwest=warn",
                )
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let mut config = Config::load()?;
    config.apply_env(|key| std::env::var(key).ok());
    info!("Config loaded from: {:?}", Config::config_path());

    let users = JsonUserStore::load(&config.storage.users_file)?;
    let state = AppState::from_config(&config, Arc::new(users));

    state.assets.ensure_root().await?;
    info!("Assets directory: {:?}", state.assets.root());

    if let Some(ai_service) = &state.ai_service {
        let timeout = Duration::from_secs(config.ai_service.health_timeout_secs);
        info!("Checking AI service health at {}", ai_service.base_url());
        match ai_service.health(timeout).await {
            Ok(_) => info!("AI service is available and healthy"),
            // Not fatal: the service may come up after the gateway.
            Err(e) => warn!("AI service is not ready: {:#}", e),
        }
    }

    let app = http::build_router(state, &config.http.cors_origin);
    if let Err(e) = http::serve(
        &config.http.bind_address,
        config.http.port,
        app,
        shutdown_signal(),
    )
    .await
    {
        error!("Gateway failed: {:#}", e);
        return Err(e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
