mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use aivis_client::BackendClient;
use aivis_engine::{Engine, SystemClock};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(aivis_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let backend = Arc::new(BackendClient::new(&config)?);
    let engine = Engine::new(
        backend,
        Arc::new(SystemClock),
        config.scheduler_max_concurrent,
    );

    let _scheduler = scheduler::build_scheduler(engine.clone(), Arc::clone(&config)).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        aivis_core::Environment::Development
    ))?;
    let app = build_app(AppState { engine }, auth, default_rate_limit_state());

    tracing::info!(bind_addr = %config.bind_addr, env = %config.env, "server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
